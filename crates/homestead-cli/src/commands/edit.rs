use homestead_core::Payload;

use crate::commands::common::{
    capture_editor_input_with_initial, changed_fields, normalize_collection,
    normalize_record_identifier, parse_fields, GlobalOptions, Session,
};
use crate::error::CliError;

pub async fn run_edit(
    collection: &str,
    id: &str,
    fields: &[String],
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let id = normalize_record_identifier(id)?;
    let explicit = parse_fields(fields)?;

    let session = Session::open(options).await?;
    let changes = if explicit.is_empty() {
        let Some(record) = session.engine.get(&collection, &id).await else {
            session.close().await;
            return Err(CliError::RecordNotFound {
                collection,
                id: id.to_string(),
            });
        };
        match edit_in_editor(&record.data) {
            Ok(changes) => changes,
            Err(error) => {
                session.close().await;
                return Err(error);
            }
        }
    } else {
        explicit
    };

    if changes.is_empty() {
        session.close().await;
        println!("{id}");
        return Ok(());
    }

    let result = session
        .engine
        .update(session.user.as_ref(), &collection, &id, changes)
        .await;
    session.close().await;

    let updated = result?;
    println!("{}", updated.id);
    Ok(())
}

fn edit_in_editor(current: &Payload) -> Result<Payload, CliError> {
    let initial = serde_json::to_string_pretty(current)?;
    let edited = capture_editor_input_with_initial(&initial)?;
    let edited: serde_json::Value = serde_json::from_str(&edited)?;
    let serde_json::Value::Object(edited) = edited else {
        return Err(CliError::InvalidEditedRecord);
    };
    Ok(changed_fields(current, &edited))
}
