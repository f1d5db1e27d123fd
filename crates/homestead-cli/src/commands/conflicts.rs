use crate::commands::common::{
    format_sync_conflict_lines, sync_conflict_to_item, GlobalOptions, Session, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts(
    limit: usize,
    as_json: bool,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let session = Session::open(options).await?;
    let conflicts = session.engine.conflicts(limit).await;
    session.close().await;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
