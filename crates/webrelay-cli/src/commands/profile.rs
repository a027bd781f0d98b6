use tokio_util::sync::CancellationToken;

use webrelay_core::Client;

use crate::error::CliError;

use super::CommandResult;

pub async fn run(client: &Client, cancel: &CancellationToken) -> Result<CommandResult, CliError> {
    let profile = client.control().profile(cancel).await?;
    Ok(CommandResult::ok(profile.raw))
}
