mod devices;
mod profile;
mod run;
mod scrape;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use webrelay_core::{Client, ClientConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Rendered command output: the result body plus routing context when the
/// command executed a task.
pub struct CommandResult {
    pub data: Value,
    pub routing: Option<Value>,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            routing: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_routing(mut self, routing: Value) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = ClientConfig::builder().from_env().build()?;
    let client = Client::new(config);
    let cancel = CancellationToken::new();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    match &cli.command {
        Command::Run(args) => run::run(args, cli, &client, &cancel).await,
        Command::Scrape(args) => scrape::run(args, cli, &client, &cancel).await,
        Command::Devices => devices::run(&client, &cancel).await,
        Command::Profile => profile::run(&client, &cancel).await,
    }
}
