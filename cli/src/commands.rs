pub mod discover;

use std::time::Duration;

use clap::{ArgAction, Parser};
use cozyscan_common::config::{Config, DEFAULT_PORT, DEFAULT_WORKERS, FragmentFormat};
use cozyscan_common::network::target::AddressRange;

#[derive(Parser)]
#[command(name = "cozyscan", version)]
#[command(about = "Finds CozyLife devices on a network and prints their configuration.")]
pub struct CommandLine {
    /// CIDR block (192.168.1.0/24), last-octet range (192.168.1.1-254)
    /// or a single address
    pub target: AddressRange,

    /// Port the identify query is sent to
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Timeout in milliseconds for each connect, write and read
    #[arg(short, long = "timeout", value_name = "MS", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Number of probes in flight
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub jobs: usize,

    /// Probe one address at a time
    #[arg(long, conflicts_with = "jobs")]
    pub sequential: bool,

    /// Print the configuration fragment as JSON instead of YAML
    #[arg(long)]
    pub json: bool,

    /// Less output: -q hides decorations, -qq prints only the fragment
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// More log output, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Do not listen for 'q' to stop the scan early
    #[arg(long)]
    pub no_input: bool,
}

impl CommandLine {
    /// Parses `std::env::args`, exiting with status 1 on usage errors.
    pub fn parse_args() -> Self {
        match Self::try_parse() {
            Ok(commands) => commands,
            Err(err) => {
                let code = if err.use_stderr() { 1 } else { 0 };
                let _ = err.print();
                std::process::exit(code);
            }
        }
    }

    pub fn to_config(&self) -> Config {
        Config {
            port: self.port,
            timeout: Duration::from_millis(self.timeout_ms),
            workers: if self.sequential { 1 } else { self.jobs.max(1) },
            quiet: self.quiet,
            fragment_format: if self.json {
                FragmentFormat::Json
            } else {
                FragmentFormat::Yaml
            },
            disable_input: self.no_input,
        }
    }
}
