use crate::commands::common::{
    normalize_collection, normalize_record_identifier, GlobalOptions, Session,
};
use crate::error::CliError;

pub async fn run_delete(
    collection: &str,
    id: &str,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let id = normalize_record_identifier(id)?;

    let session = Session::open(options).await?;
    let result = session
        .engine
        .delete(session.user.as_ref(), &collection, &id)
        .await;
    session.close().await;

    result?;
    println!("{id}");
    Ok(())
}
