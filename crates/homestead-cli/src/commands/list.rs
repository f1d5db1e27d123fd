use crate::commands::common::{
    format_record_lines, normalize_collection, record_to_item, GlobalOptions, RecordListItem,
    Session,
};
use crate::error::CliError;

pub async fn run_list(
    collection: &str,
    limit: usize,
    as_json: bool,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;

    let session = Session::open(options).await?;
    let mut records = session.engine.list(&collection).await;
    session.close().await;

    records.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    records.truncate(limit);

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No cached {collection}.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
