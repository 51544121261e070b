use std::time::Duration;

/// TCP port CozyLife devices answer the identify query on.
pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_WORKERS: usize = 64;

/// Output syntax of the configuration fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port dialed on every candidate.
    pub port: u16,
    /// Bound for each of connect, write and read.
    pub timeout: Duration,
    /// Maximum number of probes in flight. `1` scans sequentially.
    pub workers: usize,
    /// 0 prints everything, 1 hides headers and progress, 2 prints only the fragment.
    pub quiet: u8,
    pub fragment_format: FragmentFormat,
    /// Disables the keyboard listener used to stop a scan early.
    pub disable_input: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            quiet: 0,
            fragment_format: FragmentFormat::Yaml,
            disable_input: false,
        }
    }
}
