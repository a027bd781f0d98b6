use serde_json::json;
use tokio_util::sync::CancellationToken;

use webrelay_core::{Client, ExecutionRequest, ProgressCallback};

use crate::cli::{Cli, RunArgs};
use crate::error::CliError;
use crate::output::routing_to_value;

use super::CommandResult;

pub async fn run(
    args: &RunArgs,
    cli: &Cli,
    client: &Client,
    cancel: &CancellationToken,
) -> Result<CommandResult, CliError> {
    let mut request = ExecutionRequest::run(json!({ "input": args.input }))
        .with_target(cli.target.to_target())
        .with_require_local_session(args.require_local);
    if let Some(device_id) = &args.device_id {
        request = request.with_device_id(device_id.clone());
    }
    if let Some(trajectory_id) = &args.trajectory_id {
        request = request.with_trajectory(trajectory_id.clone(), args.phase);
    }

    let on_event: Option<ProgressCallback> = cli.progress.then(|| {
        Box::new(|event: webrelay_core::StreamEvent| {
            eprintln!("[{}] {}", event.event, event.data);
        }) as ProgressCallback
    });

    let outcome = client.run(&request, cancel, on_event).await?;

    let mut result = CommandResult::ok(outcome.result).with_routing(routing_to_value(
        &outcome.routing,
        &outcome.trajectory_id,
        outcome.phase,
    ));
    if let Some(warning) = outcome.stream_warning {
        result = result.with_warning(warning);
    }
    Ok(result)
}
