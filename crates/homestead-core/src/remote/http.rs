//! REST client for the managed Homestead API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use crate::models::{Payload, RecordId, RemoteRecord, TimeRange};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const HEALTH_TIMEOUT_SECS: u64 = 3;

/// Remote store speaking JSON over `{base}/v1/{collection}` endpoints.
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> crate::Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|error| crate::Error::InvalidInput(format!("HTTP client: {error}")))?;
        Ok(Self {
            base_url,
            access_token: normalize_text_option(access_token),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the API; used as the connectivity signal by the CLI.
    pub async fn health(&self) -> bool {
        let url = format!("{}/v1/health", self.base_url);
        match self
            .client
            .get(url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Health probe failed: {error}");
                false
            }
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/{}",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn record_url(&self, collection: &str, id: &RecordId) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match self.access_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::new(
            kind_for_status(status),
            parse_api_error(status, &body),
        ))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|error| RemoteError::new(RemoteErrorKind::Decode, error.to_string()))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create(&self, collection: &str, payload: &Payload) -> RemoteResult<RemoteRecord> {
        let request = self.client.post(self.collection_url(collection)).json(payload);
        self.send_json(request).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        changes: &Payload,
    ) -> RemoteResult<RemoteRecord> {
        let request = self.client.patch(self.record_url(collection, id)).json(changes);
        self.send_json(request).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()> {
        let request = self.client.delete(self.record_url(collection, id));
        self.send(request).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &RecordId) -> RemoteResult<Option<RemoteRecord>> {
        let request = self.client.get(self.record_url(collection, id));
        match self.send_json(request).await {
            Ok(record) => Ok(Some(record)),
            Err(error) if error.kind == RemoteErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn query_range(
        &self,
        collection: &str,
        range: TimeRange,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let request = self
            .client
            .get(self.collection_url(collection))
            .query(&[("start", range.start), ("end", range.end)]);
        let page: RecordPage = self.send_json(request).await?;
        Ok(page.into_records())
    }
}

/// Range responses are either a bare array or `{"records": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordPage {
    Bare(Vec<RemoteRecord>),
    Wrapped { records: Vec<RemoteRecord> },
}

impl RecordPage {
    fn into_records(self) -> Vec<RemoteRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { records } => records,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn kind_for_status(status: StatusCode) -> RemoteErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteErrorKind::Permission,
        StatusCode::NOT_FOUND => RemoteErrorKind::NotFound,
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => RemoteErrorKind::Network,
        _ => RemoteErrorKind::Api,
    }
}

fn map_transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_decode() {
        RemoteError::new(RemoteErrorKind::Decode, error.to_string())
    } else {
        RemoteError::network(error.to_string())
    }
}

fn normalize_base_url(raw: String) -> crate::Result<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        crate::Error::InvalidInput("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(crate::Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
