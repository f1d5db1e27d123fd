use homestead_core::sync::DrainSkip;

use crate::commands::common::{GlobalOptions, Session};
use crate::error::CliError;

pub async fn run_sync(options: &GlobalOptions) -> Result<(), CliError> {
    let session = Session::open(options).await?;
    let user = match session.require_user() {
        Ok(user) => user.clone(),
        Err(error) => {
            session.close().await;
            return Err(error);
        }
    };

    let report = session.engine.sync(&user).await;
    let remaining = session.engine.status().await.pending_operations;
    session.close().await;

    match report.skipped {
        Some(DrainSkip::Offline) => {
            println!("Offline: {remaining} changes remain queued");
        }
        Some(DrainSkip::AlreadyRunning) => {
            println!("A sync is already running");
        }
        None if report.failed == 0 => {
            println!("Sync completed ({} changes sent)", report.succeeded);
        }
        None => {
            println!(
                "Sync finished with failures: {} sent, {} failed, {remaining} still queued",
                report.succeeded, report.failed
            );
        }
    }
    Ok(())
}
