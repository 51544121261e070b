mod commands;
mod terminal;

use commands::{CommandLine, discover};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose);
    let cfg = commands.to_config();

    print::header("searching for cozylife devices", cfg.quiet);
    discover::discover(&commands.target, &cfg).await
}
