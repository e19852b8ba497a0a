// src/cli.rs

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cmdctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdctl",
    version,
    about = "Keep declarative local commands running, restarted and disabled on cue.",
    long_about = None
)]
pub struct CliArgs {
    /// Config file (TOML). Relative file watch paths resolve against its directory.
    #[arg(long, value_name = "PATH", default_value = "Cmdctl.toml")]
    pub config: PathBuf,

    /// Overrides `config.workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// If omitted, `CMDCTL_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the declared resources, start nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't watch the filesystem; file watches only fire via `touch`.
    #[arg(long)]
    pub no_watch: bool,

    /// Don't read control commands from stdin.
    #[arg(long)]
    pub no_control: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["cmdctl"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Cmdctl.toml"));
        assert_eq!(args.workers, None);
        assert!(!args.dry_run && !args.no_watch && !args.no_control);
    }

    #[test]
    fn overrides() {
        let args = CliArgs::try_parse_from([
            "cmdctl",
            "--config",
            "dev/Cmdctl.toml",
            "--workers",
            "8",
            "--log-level",
            "debug",
            "--no-watch",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("dev/Cmdctl.toml"));
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.no_watch);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(CliArgs::try_parse_from(["cmdctl", "--log-level", "loud"]).is_err());
    }
}
