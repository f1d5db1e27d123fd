use crate::commands::common::{
    format_record_lines, normalize_collection, normalize_record_identifier, record_to_item,
    GlobalOptions, Session,
};
use crate::error::CliError;

pub async fn run_get(
    collection: &str,
    id: &str,
    as_json: bool,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let id = normalize_record_identifier(id)?;

    let session = Session::open(options).await?;
    let record = session.engine.get(&collection, &id).await;
    session.close().await;

    let Some(record) = record else {
        return Err(CliError::RecordNotFound {
            collection,
            id: id.to_string(),
        });
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&record_to_item(&record))?);
    } else {
        for line in format_record_lines(std::slice::from_ref(&record)) {
            println!("{line}");
        }
        println!("{}", serde_json::to_string_pretty(&record.data)?);
    }
    Ok(())
}
