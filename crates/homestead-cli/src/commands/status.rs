use homestead_core::SyncStatus;

use crate::commands::common::{format_sync_timestamp, GlobalOptions, Session};
use crate::error::CliError;

pub async fn run_status(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let session = Session::open(options).await?;
    let status = session.engine.status().await;
    session.close().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(status: &SyncStatus) -> Vec<String> {
    let last_sync = status
        .last_sync_at
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let mut lines = vec![
        format!("State:     {}", status.state.label()),
        format!("Queued:    {}", status.pending_operations),
        format!("Last sync: {last_sync}"),
    ];
    for error in &status.recent_errors {
        lines.push(format!(
            "  {}  {} {}/{}: {}",
            format_sync_timestamp(error.occurred_at),
            error.kind,
            error.collection,
            error.document_id,
            error.message
        ));
    }
    lines
}
