//! CLI argument definitions for loghive-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Loghive syslog indexing daemon.
///
/// Receives syslog events over TCP/UDP, indexes them into
/// time-partitioned full-text indexes, and serves boolean queries
/// over a line protocol.
#[derive(Parser, Debug)]
#[command(name = "loghive-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to loghive.toml configuration file.
    #[arg(short, long, default_value = "/etc/loghive/loghive.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the index data directory.
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path() {
        let cli = DaemonCli::parse_from(["loghive-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/loghive/loghive.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = DaemonCli::parse_from([
            "loghive-daemon",
            "--config",
            "/tmp/test.toml",
            "--log-level",
            "debug",
            "--data-dir",
            "/tmp/data",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/test.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/data"));
        assert!(cli.validate);
    }
}
