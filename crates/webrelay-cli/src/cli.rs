//! CLI argument definitions for Webrelay.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Execute an automation task |
//! | `scrape` | Scrape one or more URLs |
//! | `devices` | List reachable extension devices |
//! | `profile` | Show the authenticated account profile |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--target` | `auto` | Execution channel (auto, cloud, extension) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--progress` | `false` | Print progress events to stderr |
//!
//! # Examples
//!
//! ```bash
//! # Run a task with automatic channel selection
//! webrelay run "find the cheapest flight to Lisbon next weekend"
//!
//! # Force the cloud channel
//! webrelay run "summarize example.com" --target cloud
//!
//! # Scrape through a specific device
//! webrelay scrape https://example.com --device-id d-1
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

use webrelay_core::ExecutionTarget;

/// Webrelay - browser automation through cloud or local extension
///
/// Routes automation tasks to a managed cloud backend or a locally
/// installed browser extension, with automatic channel selection.
#[derive(Debug, Parser)]
#[command(
    name = "webrelay",
    author,
    version,
    about = "Browser automation CLI with cloud/extension routing"
)]
pub struct Cli {
    /// Execution channel for the task.
    #[arg(long, global = true, value_enum, default_value_t = TargetSelector::Auto)]
    pub target: TargetSelector,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Print progress events to stderr while the task runs.
    #[arg(long, global = true, default_value_t = false)]
    pub progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Execution channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetSelector {
    /// Prefer a reachable extension device, fall back to cloud.
    Auto,
    /// Use the managed cloud backend directly.
    Cloud,
    /// Use the local browser extension directly.
    Extension,
}

impl TargetSelector {
    pub const fn to_target(self) -> ExecutionTarget {
        match self {
            Self::Auto => ExecutionTarget::Auto,
            Self::Cloud => ExecutionTarget::Cloud,
            Self::Extension => ExecutionTarget::Extension,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute an automation task.
    ///
    /// # Examples
    ///
    ///   webrelay run "book a table for two tomorrow at 7pm"
    ///   webrelay run "collect today's headlines" --target cloud
    Run(RunArgs),

    /// Scrape one or more URLs.
    ///
    /// # Examples
    ///
    ///   webrelay scrape https://example.com
    ///   webrelay scrape https://a.test https://b.test --device-id d-1
    Scrape(ScrapeArgs),

    /// List reachable extension devices.
    Devices,

    /// Show the authenticated account profile.
    Profile,
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Natural-language task instruction.
    pub input: String,

    /// Route to a specific extension device.
    ///
    /// Implies a hard local-session requirement: the task fails rather
    /// than silently running in the cloud.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Require a local extension session even without a specific device.
    #[arg(long, default_value_t = false)]
    pub require_local: bool,

    /// Resume an existing trajectory instead of starting a new one.
    #[arg(long)]
    pub trajectory_id: Option<String>,

    /// Phase number within the trajectory.
    #[arg(long, default_value_t = 1)]
    pub phase: u32,
}

/// Arguments for the `scrape` command.
#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// URLs to scrape.
    #[arg(required = true, num_args = 1..)]
    pub urls: Vec<String>,

    /// Route to a specific extension device.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Require a local extension session even without a specific device.
    #[arg(long, default_value_t = false)]
    pub require_local: bool,
}
