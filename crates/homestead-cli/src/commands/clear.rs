use crate::commands::common::{GlobalOptions, Session};
use crate::error::CliError;

pub async fn run_clear(confirmed: bool, options: &GlobalOptions) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }

    let session = Session::open(options).await?;
    let pending = session.engine.status().await.pending_operations;
    session.engine.clear_offline_data().await;
    session.close().await;

    println!("Offline data cleared ({pending} unsynced changes discarded)");
    Ok(())
}
