// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `extkit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "extkit",
    version,
    about = "Build browser extensions and reload only what changed in dev mode.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the config file (TOML).
    ///
    /// Default: `Extkit.toml` in the current working directory.
    #[arg(short = 'c', long, value_name = "PATH", default_value = "Extkit.toml", global = true)]
    pub config: String,

    /// Target browser.
    #[arg(short = 'b', long, value_enum, value_name = "BROWSER", global = true)]
    pub browser: Option<BrowserArg>,

    /// Target Manifest V2.
    #[arg(long, conflicts_with = "mv3", global = true)]
    pub mv2: bool,

    /// Target Manifest V3.
    #[arg(long, conflicts_with = "mv2", global = true)]
    pub mv3: bool,

    /// Build mode (development or production).
    #[arg(short = 'm', long, value_enum, value_name = "MODE", global = true)]
    pub mode: Option<ModeArg>,

    /// Only build entrypoints whose name matches; everything else is marked
    /// skipped (still listed, excluded from output). May be repeated.
    #[arg(short = 'e', long = "filter-entrypoint", value_name = "NAME", global = true)]
    pub filter_entrypoints: Vec<String>,

    /// Ask the Builder to emit a bundle analysis after the build.
    #[arg(long, global = true)]
    pub analyze: bool,

    /// Shorthand for `--log-level debug`.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXTKIT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the dev server: build once, watch, and hot-reload on change.
    Dev,
    /// Build the extension once.
    Build,
    /// Build in production mode and package the output directory.
    Zip,
    /// Classify and validate entrypoints without building.
    Prepare,
    /// Remove the output directory.
    Clean,
    /// Scaffold a new project in the current directory.
    Init,
}

/// Browser as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum BrowserArg {
    Chrome,
    Firefox,
    Edge,
    Opera,
    Safari,
}

/// Build mode as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum ModeArg {
    Development,
    Production,
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

impl CliArgs {
    /// Effective log level, folding in the `--debug` shorthand.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            Some(LogLevel::Debug)
        } else {
            self.log_level
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
