//! Paginated list and detail retrieval from the Source CMS.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::errors::{ApiError, SyncError};
use crate::http;
use crate::logging::{Progress, RunLogger};
use crate::models::{FieldValues, ItemKind, ItemSummary};

/// Items requested per list page.
pub const PAGE_SIZE: usize = 100;

/// Pause before every Source request, to stay under its rate limits.
pub const REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Result of enumerating one Source collection.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub items: Vec<ItemSummary>,
    /// Entries without a usable id or display name.
    pub skipped: usize,
}

/// Read-only client for the Source REST API.
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    clock: Arc<dyn Clock>,
    log: RunLogger,
    progress: Progress,
}

impl SourceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: &str,
        clock: Arc<dyn Clock>,
        log: RunLogger,
        progress: Progress,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| ApiError::InvalidHeader("source api key"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let http = http::build_client(headers, http::API_TIMEOUT)?;
        debug!(base_url = %base_url, "created SourceClient");
        Ok(Self {
            http,
            base_url,
            clock,
            log,
            progress,
        })
    }

    /// Enumerate every item of `kind`, following offset pagination.
    ///
    /// The first request carries only `limit`; later ones add `offset`.
    /// Enumeration stops at the first short or empty page. Cancellation is
    /// checked before each page.
    #[instrument(skip(self, cancel), fields(kind = %kind))]
    pub async fn list_all(
        &self,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> Result<Listing, SyncError> {
        let mut listing = Listing::default();
        let mut offset = 0usize;
        let limit = PAGE_SIZE.to_string();

        loop {
            cancel.check()?;
            self.clock.sleep(REQUEST_DELAY).await;

            let url = format!("{}{}", self.base_url, kind.list_path());
            let mut req = self.http.get(&url).query(&[("limit", limit.as_str())]);
            if offset > 0 {
                req = req.query(&[("offset", offset.to_string())]);
            }

            self.log.info(format!(
                "Fetching {} list from Source: offset {}",
                kind.collection_key(),
                offset
            ));
            self.progress
                .report(format!("Fetching {} (offset {})", kind.label(), offset));
            self.log.debug(format!(
                "Requesting URL: {}?limit={}{}",
                url,
                limit,
                offset_suffix(offset)
            ));

            let resp = http::check_response(req.send().await.map_err(ApiError::from)?).await?;
            let body = http::read_json(resp).await?;
            let page = body
                .get(kind.collection_key())
                .and_then(Value::as_array)
                .ok_or_else(|| ApiError::missing(kind.collection_key()))?;

            if page.is_empty() {
                break;
            }
            for entry in page {
                match ItemSummary::from_value(kind, entry) {
                    Some(summary) => listing.items.push(summary),
                    None => {
                        warn!(kind = %kind, "skipping list entry without id or name");
                        self.log
                            .debug(format!("Skipping {} entry without id or name: {}", kind, entry));
                        listing.skipped += 1;
                    }
                }
            }
            offset += page.len();
            if page.len() < PAGE_SIZE {
                break;
            }
        }

        debug!(count = listing.items.len(), skipped = listing.skipped, "listed items");
        Ok(listing)
    }

    /// Fetch the translatable fields of a single item.
    ///
    /// Only the kind's declared fields are returned, in declared order; a
    /// missing or non-string value comes back as `None`.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn get_details(&self, kind: ItemKind, id: &str) -> Result<FieldValues, ApiError> {
        self.clock.sleep(REQUEST_DELAY).await;

        let url = format!("{}{}", self.base_url, kind.info_path());
        self.log.info(format!("  > Fetching details for ID: {}", id));
        self.log
            .debug(format!("Requesting URL: {}?{}={}", url, kind.id_param(), id));

        let resp = self
            .http
            .get(&url)
            .query(&[(kind.id_param(), id)])
            .send()
            .await?;
        let resp = http::check_response(resp).await?;
        let body = http::read_json(resp).await?;
        if !body.is_object() {
            return Err(ApiError::missing(kind.fields().join(",")));
        }
        Ok(extract_fields(kind, &body))
    }
}

fn offset_suffix(offset: usize) -> String {
    if offset > 0 {
        format!("&offset={}", offset)
    } else {
        String::new()
    }
}

fn extract_fields(kind: ItemKind, body: &Value) -> FieldValues {
    kind.fields()
        .iter()
        .map(|field| {
            let value = body.get(*field).and_then(Value::as_str).map(str::to_string);
            (field.to_string(), value)
        })
        .collect()
}
