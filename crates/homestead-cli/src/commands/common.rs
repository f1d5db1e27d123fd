use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use homestead_core::models::{RemoteRecord, SyncConflict};
use homestead_core::remote::{HttpRemoteStore, RemoteError, RemoteResult, RemoteStore};
use homestead_core::util::{normalize_text_option, timestamp_millis};
use homestead_core::{
    CachedRecord, Connectivity, EngineConfig, Payload, RecordId, SyncEngine, TimeRange, UserId,
};
use serde::Serialize;
use serde_json::Value;

use crate::config_profiles::{engine_config_path, CliProfilesConfig};
use crate::error::CliError;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub data_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub offline: bool,
}

/// An opened engine plus the identity commands act as.
pub struct Session {
    pub engine: SyncEngine,
    pub user: Option<UserId>,
}

impl Session {
    pub async fn open(options: &GlobalOptions) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load()?;
        let profile_name = profiles.resolve_profile_name(options.profile.as_deref());
        let profile = profiles.profile(&profile_name).cloned().unwrap_or_default();

        let api_url = normalize_text_option(env::var("HOMESTEAD_API_URL").ok())
            .or_else(|| profile.api_base_url());
        let user = normalize_text_option(env::var("HOMESTEAD_USER_ID").ok())
            .or_else(|| profile.user_id())
            .map(UserId::new);

        let (remote, online) = connect_remote(api_url, options.offline).await?;
        let config = EngineConfig::load_from_path(&engine_config_path())?;
        let data_path = resolve_data_path(options.data_path.clone());
        let engine = SyncEngine::open_path(&data_path, remote, Connectivity::new(online), config)?;
        tracing::debug!(
            "Opened offline data at {} ({})",
            data_path.display(),
            if online { "online" } else { "offline" }
        );

        Ok(Self { engine, user })
    }

    pub fn require_user(&self) -> Result<&UserId, CliError> {
        self.user.as_ref().ok_or(CliError::NotSignedIn)
    }

    /// Flush state before the process exits.
    pub async fn close(self) {
        self.engine.shutdown().await;
    }
}

async fn connect_remote(
    api_url: Option<String>,
    force_offline: bool,
) -> Result<(Arc<dyn RemoteStore>, bool), CliError> {
    let Some(api_url) = api_url else {
        tracing::info!("No API URL configured, working offline");
        return Ok((Arc::new(DetachedRemote), false));
    };

    let token = normalize_text_option(env::var("HOMESTEAD_ACCESS_TOKEN").ok());
    let remote = HttpRemoteStore::new(api_url, token)?;
    if force_offline {
        return Ok((Arc::new(remote), false));
    }

    let online = remote.health().await;
    if !online {
        tracing::warn!("{} is unreachable, working offline", remote.base_url());
    }
    Ok((Arc::new(remote), online))
}

/// Remote store used when no API is configured; every call fails.
struct DetachedRemote;

impl DetachedRemote {
    fn unavailable<T>() -> RemoteResult<T> {
        Err(RemoteError::network("no API URL configured"))
    }
}

#[async_trait]
impl RemoteStore for DetachedRemote {
    async fn create(&self, _collection: &str, _payload: &Payload) -> RemoteResult<RemoteRecord> {
        Self::unavailable()
    }

    async fn update(
        &self,
        _collection: &str,
        _id: &RecordId,
        _changes: &Payload,
    ) -> RemoteResult<RemoteRecord> {
        Self::unavailable()
    }

    async fn delete(&self, _collection: &str, _id: &RecordId) -> RemoteResult<()> {
        Self::unavailable()
    }

    async fn get(&self, _collection: &str, _id: &RecordId) -> RemoteResult<Option<RemoteRecord>> {
        Self::unavailable()
    }

    async fn query_range(
        &self,
        _collection: &str,
        _range: TimeRange,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        Self::unavailable()
    }
}

pub fn resolve_data_path(cli_data_path: Option<PathBuf>) -> PathBuf {
    cli_data_path
        .or_else(|| env::var_os("HOMESTEAD_DATA_PATH").map(PathBuf::from))
        .unwrap_or_else(default_data_path)
}

pub fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("homestead")
        .join("offline.db")
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub collection: String,
    pub id: String,
    pub temporary: bool,
    pub data: Payload,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub collection: String,
    pub record_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

pub fn normalize_collection(collection: &str) -> Result<String, CliError> {
    let trimmed = collection.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCollection)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<RecordId, CliError> {
    id.parse::<RecordId>().map_err(|_| CliError::EmptyRecordId)
}

/// Parse `key=value` arguments into a payload.
///
/// Values that parse as JSON keep their type (`done=true`, `count=3`);
/// anything else is stored as a string.
pub fn parse_fields(fields: &[String]) -> Result<Payload, CliError> {
    let mut payload = Payload::new();
    for field in fields {
        let Some((key, raw)) = field.split_once('=') else {
            return Err(CliError::InvalidField(field.clone()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidField(field.clone()));
        }
        let value = serde_json::from_str::<Value>(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        payload.insert(key.to_string(), value);
    }
    Ok(payload)
}

/// Fields of `after` that differ from `before`; removed fields become null.
pub fn changed_fields(before: &Payload, after: &Payload) -> Payload {
    let mut changes: Payload = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    for key in before.keys() {
        if !after.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }
    changes
}

pub fn parse_time_bound(raw: &str) -> Result<i64, CliError> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<i64>()
        .map_or_else(|_| Value::String(trimmed.to_string()), Value::from);
    timestamp_millis(&value).ok_or_else(|| CliError::InvalidRangeBound(raw.to_string()))
}

pub fn parse_range(from: &str, to: &str) -> Result<TimeRange, CliError> {
    let start = parse_time_bound(from)?;
    let end = parse_time_bound(to)?;
    Ok(TimeRange::new(start, end)?)
}

pub fn record_preview(record: &CachedRecord, max_chars: usize) -> String {
    let rendered = ["title", "name"]
        .iter()
        .find_map(|key| record.data.get(*key).and_then(Value::as_str))
        .map_or_else(|| Value::Object(record.data.clone()).to_string(), str::to_string);
    let collapsed = rendered.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_record_lines(records: &[CachedRecord]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let preview = record_preview(record, 40);
            let relative_time = format_relative_time(record.updated_at, now_ms);
            let marker = if record.id.is_temporary() {
                "  (not synced)"
            } else {
                ""
            };
            format!("{id:<24}  {preview:<40}  {relative_time}{marker}")
        })
        .collect()
}

pub fn record_to_item(record: &CachedRecord) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        collection: record.collection.clone(),
        id: record.id.to_string(),
        temporary: record.id.is_temporary(),
        data: record.data.clone(),
        updated_at: record.updated_at,
        relative_time: format_relative_time(record.updated_at, now_ms),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        collection: conflict.collection.clone(),
        record_id: conflict.record_id.to_string(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        winner: format!("{:?}", conflict.winner).to_ascii_lowercase(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  {}/{}  local={} remote={}  kept {:?}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.collection,
                conflict.record_id,
                conflict.local_updated_at,
                conflict.remote_updated_at,
                conflict.winner
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Let the user edit `initial` in their editor; returns the saved text.
pub fn capture_editor_input_with_initial(initial_content: &str) -> Result<String, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_record_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let edited = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(edited)
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_record_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("homestead-record-{}-{now}.json", std::process::id()))
}
