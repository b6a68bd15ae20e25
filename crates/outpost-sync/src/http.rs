//! HTTP implementation of [`RemoteApi`].
//!
//! - `POST {base}/events`: one audit record, `id` set to the local ID
//! - `{method} {base}{path}`: operation replay, body sent verbatim
//! - `GET {base}/events?from&to&actor&category&limit`: history page
//!
//! Every delivery carries the local event ID in an `Idempotency-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use outpost_config::RemoteSection;
use outpost_core::{AuditRecord, DeferredOperation, EventId, Method, QueuedEvent};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::RemoteError;
use crate::remote::{HistoryQuery, RemoteApi, RemoteRecord};

const EVENTS_PATH: &str = "/events";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const MAX_ERROR_BODY: usize = 512;

/// History responses come either bare or wrapped in `items`.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPage {
    Wrapped { items: Vec<RemoteRecord> },
    Bare(Vec<RemoteRecord>),
}

impl HistoryPage {
    fn into_records(self) -> Vec<RemoteRecord> {
        match self {
            Self::Wrapped { items } | Self::Bare(items) => items,
        }
    }
}

/// `reqwest`-backed remote client.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpRemote {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidRequest`] if the URL does not parse or
    /// the client cannot be built.
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::InvalidRequest(format!("base URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    /// Create a client from the `remote` config section.
    ///
    /// # Errors
    ///
    /// See [`HttpRemote::new`].
    pub fn from_section(section: &RemoteSection) -> Result<Self, RemoteError> {
        Self::new(
            &section.base_url,
            section.api_token.clone(),
            section.timeout(),
        )
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `path` appended.
    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| RemoteError::InvalidRequest(format!("{joined}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let method = match method {
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        self.authorized(self.client.request(method, url))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn send_audit(
        &self,
        event: &QueuedEvent,
        record: &AuditRecord,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(EVENTS_PATH)?;
        debug!(event_id = %event.id, %url, "Sending audit event");
        let builder = self
            .request(Method::Post, url)
            .header(IDEMPOTENCY_HEADER, event.id.to_string())
            .json(&RemoteRecord::from_audit(event, record));
        Self::send(builder).await.map(drop)
    }

    async fn replay_operation(
        &self,
        id: EventId,
        operation: &DeferredOperation,
    ) -> Result<(), RemoteError> {
        let replay = operation.request();
        let url = self.endpoint(&replay.path)?;
        debug!(event_id = %id, method = replay.method.as_str(), %url, "Replaying operation");
        let mut builder = self
            .request(replay.method, url)
            .header(IDEMPOTENCY_HEADER, id.to_string());
        if let Some(body) = &replay.body {
            builder = builder.json(body);
        }
        Self::send(builder).await.map(drop)
    }

    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<QueuedEvent>, RemoteError> {
        let url = self.endpoint(EVENTS_PATH)?;
        let builder = self
            .authorized(self.client.get(url))
            .query(&query.query_pairs());
        let page: HistoryPage = Self::send(builder).await?.json().await?;

        let records = page.into_records();
        let fetched = records.len();
        let events: Vec<QueuedEvent> = records
            .into_iter()
            .take(query.limit)
            .filter_map(|record| match record.into_event() {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable history record");
                    None
                },
            })
            .collect();
        debug!(fetched, kept = events.len(), "Fetched remote history");
        Ok(events)
    }
}
