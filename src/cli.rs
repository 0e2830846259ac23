// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build front-end assets from a task graph, watch, and serve them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// The directory containing it is the project root.
    #[arg(long, global = true, value_name = "PATH", default_value = "Assetdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or `info` is used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List tasks with their prerequisites.
    ListTasks,

    /// Run tasks after their prerequisites.
    Run {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },

    /// Re-run tasks when the files of their watch groups change.
    Watch,

    /// Build, start the dev server, and restart it on server-side changes.
    Serve {
        /// Environment from `[serve.env.<name>]`; defaults to `ASSETDAG_ENV`,
        /// then the only configured environment.
        env: Option<String>,
    },

    /// Remove the staging directory.
    Clean,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
