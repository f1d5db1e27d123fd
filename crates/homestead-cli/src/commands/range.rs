use crate::commands::common::{
    format_record_lines, normalize_collection, parse_range, record_to_item, GlobalOptions,
    RecordListItem, Session,
};
use crate::error::CliError;

pub async fn run_range(
    collection: &str,
    from: &str,
    to: &str,
    refresh: bool,
    as_json: bool,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let range = parse_range(from, to)?;

    let session = Session::open(options).await?;
    if refresh {
        session.engine.invalidate_ranges(&collection).await;
    }
    let records = session.engine.query_range(&collection, range).await;
    session.close().await;

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }
    Ok(())
}
