use tokio_util::sync::CancellationToken;

use webrelay_core::Client;

use crate::error::CliError;

use super::CommandResult;

pub async fn run(client: &Client, cancel: &CancellationToken) -> Result<CommandResult, CliError> {
    let devices = client.list_devices(cancel).await?;
    Ok(CommandResult::ok(serde_json::to_value(devices)?))
}
