use crate::commands::common::{normalize_collection, parse_fields, GlobalOptions, Session};
use crate::error::CliError;

pub async fn run_add(
    collection: &str,
    fields: &[String],
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let data = parse_fields(fields)?;
    if data.is_empty() {
        return Err(CliError::EmptyFields);
    }

    let session = Session::open(options).await?;
    let result = session
        .engine
        .create(session.user.as_ref(), &collection, data)
        .await;
    session.close().await;

    let record = result?;
    println!("{}", record.id);
    Ok(())
}
