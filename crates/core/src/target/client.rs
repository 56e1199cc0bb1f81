//! Target REST client: resource reconciliation, string uploads and the TMX
//! export endpoints used by the backup job.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::errors::ApiError;
use crate::http::{self, API_TIMEOUT, DOWNLOAD_TIMEOUT};
use crate::logging::RunLogger;
use crate::models::{non_blank_fields, ResourceAction, UploadOutcome};
use crate::target::payload;

const JSON_API: &str = "application/vnd.api+json";

/// Remote status of an async export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Pending,
    Completed,
    Failed,
}

impl RemoteJobStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "completed" | "succeeded" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Answer to a job status request.
///
/// Target either returns a JSON status document, or, once the export is
/// ready, may redirect straight to the file. reqwest follows the redirect,
/// so the second shape arrives as a body that is not a JSON object.
#[derive(Debug, Clone)]
pub enum PollResponse {
    Status {
        status: RemoteJobStatus,
        download_url: Option<String>,
    },
    File(Vec<u8>),
}

/// Client for the Target JSON:API.
pub struct TargetClient {
    http: reqwest::Client,
    /// No credentials: export links are pre-signed.
    download_http: reqwest::Client,
    headers: HeaderMap,
    api_url: String,
    organization: String,
    project: String,
    log: RunLogger,
    /// Fingerprint of the last content uploaded per resource slug.
    uploaded: Mutex<HashMap<String, String>>,
}

impl TargetClient {
    pub fn new(
        api_url: impl Into<String>,
        token: &str,
        organization: impl Into<String>,
        project: impl Into<String>,
        log: RunLogger,
    ) -> Result<Self, ApiError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidHeader("target api token"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
        let http = http::build_client(headers.clone(), API_TIMEOUT)?;
        let download_http = http::build_client(HeaderMap::new(), DOWNLOAD_TIMEOUT)?;
        info!(api_url = %api_url, "created TargetClient");
        Ok(Self {
            http,
            download_http,
            headers,
            api_url,
            organization: organization.into(),
            project: project.into(),
            log,
            uploaded: Mutex::new(HashMap::new()),
        })
    }

    /// `o:{org}:p:{project}`.
    pub fn project_id(&self) -> String {
        format!("o:{}:p:{}", self.organization, self.project)
    }

    /// `o:{org}:p:{project}:r:{slug}`.
    pub fn resource_id(&self, slug: &str) -> String {
        format!("{}:r:{}", self.project_id(), slug)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    async fn send_json(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<reqwest::Response, ApiError> {
        let encoded = serde_json::to_vec(body)?;
        if self.log.debug_enabled() {
            self.log.debug(format!("Sending {} to URL: {}", method, url));
            self.log
                .debug(format!("Request Headers: {}", http::redacted_headers(&self.headers)));
            self.log.debug(format!("Request Payload: {}", body));
        }
        let resp = self
            .http
            .request(method, url)
            .body(encoded)
            .send()
            .await?;
        http::check_response(resp).await
    }

    // -- Resources -----------------------------------------------------------

    /// Make sure a resource with `slug` exists and is called `name`.
    ///
    /// Always reads before writing, so re-running over unchanged data never
    /// mutates anything.
    #[instrument(skip(self))]
    pub async fn ensure_resource(&self, slug: &str, name: &str) -> Result<ResourceAction, ApiError> {
        let resource_id = self.resource_id(slug);
        let url = self.url(&format!("resources/{}", resource_id));
        self.log.debug(format!("Checking for resource at URL: {}", url));

        let resp = self.http.get(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                self.log
                    .info(format!("  > Resource '{}' not found. Creating...", slug));
                let doc = payload::create_resource(&self.project_id(), slug, name);
                self.send_json(Method::POST, &self.url("resources"), &doc)
                    .await?;
                self.log
                    .info(format!("  > Resource '{}' created with name '{}'.", slug, name));
                Ok(ResourceAction::Created)
            }
            StatusCode::OK => {
                let body = http::read_json(resp).await?;
                let existing = http::json_str(&body, "data.attributes.name")?;
                if existing == name {
                    self.log.info(format!(
                        "  > Resource '{}' found with correct name '{}'.",
                        slug, name
                    ));
                    return Ok(ResourceAction::Unchanged);
                }
                self.log.info(format!(
                    "  > Resource '{}' found. Updating name from '{}' to '{}'...",
                    slug, existing, name
                ));
                let doc = payload::rename_resource(&resource_id, name);
                self.send_json(Method::PATCH, &url, &doc).await?;
                self.log.info("  > Name updated successfully.");
                Ok(ResourceAction::Renamed)
            }
            _ => {
                http::check_response(resp).await?;
                // A 2xx other than 200 carries no resource document.
                Err(ApiError::missing("data.attributes.name"))
            }
        }
    }

    // -- Strings -------------------------------------------------------------

    /// Start an async upload of the non-blank `fields` into resource `slug`.
    ///
    /// Nothing is sent when every field is blank, or when the same content
    /// was already uploaded to this resource by this client.
    #[instrument(skip(self, fields))]
    pub async fn upload_content(
        &self,
        slug: &str,
        fields: &[(String, Option<String>)],
    ) -> Result<UploadOutcome, ApiError> {
        let content = non_blank_fields(fields);
        if content.is_empty() {
            self.log.info("  > No content to upload. Skipping.");
            return Ok(UploadOutcome::SkippedBlank);
        }

        let encoded = serde_json::to_string(&content)?;
        let fingerprint = hex::encode(Sha256::digest(encoded.as_bytes()));
        if self.last_upload(slug).as_deref() == Some(fingerprint.as_str()) {
            self.log.info(format!(
                "  > Content of '{}' unchanged since last upload. Skipping.",
                slug
            ));
            return Ok(UploadOutcome::SkippedUnchanged);
        }

        self.log.info(format!(
            "  > Preparing to upload {} string(s) to resource '{}'...",
            content.len(),
            slug
        ));
        let doc = payload::strings_upload(&self.resource_id(slug), &encoded);
        let resp = self
            .send_json(
                Method::POST,
                &self.url("resource_strings_async_uploads"),
                &doc,
            )
            .await?;
        if resp.status() == StatusCode::ACCEPTED {
            self.log.info("  > Successfully started upload job.");
        }
        if let Ok(mut uploaded) = self.uploaded.lock() {
            uploaded.insert(slug.to_string(), fingerprint);
        }
        debug!(slug, strings = content.len(), "upload job started");
        Ok(UploadOutcome::Started)
    }

    fn last_upload(&self, slug: &str) -> Option<String> {
        self.uploaded.lock().ok()?.get(slug).cloned()
    }

    // -- TMX export ----------------------------------------------------------

    /// Ask Target to export the whole project, all languages, as one TMX.
    /// Returns the job id.
    #[instrument(skip(self))]
    pub async fn start_tmx_export(&self) -> Result<String, ApiError> {
        let doc = payload::tmx_export(&self.project_id());
        let resp = self
            .send_json(Method::POST, &self.url("tmx_async_downloads"), &doc)
            .await?;
        let body = http::read_json(resp).await?;
        let job_id = http::json_str(&body, "data.id")?.to_string();
        debug!(job_id = %job_id, "tmx export job created");
        Ok(job_id)
    }

    /// Current state of an export job, or the file itself once ready.
    #[instrument(skip(self))]
    pub async fn tmx_job_status(&self, job_id: &str) -> Result<PollResponse, ApiError> {
        let url = self.url(&format!("tmx_async_downloads/{}", job_id));
        let resp = self
            .http
            .get(&url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let resp = http::check_response(resp).await?;
        let declared_binary = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_binary_content_type);
        let bytes = resp.bytes().await?;

        // The body decides; the header only short-circuits obvious files.
        let doc = if declared_binary {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes)
                .ok()
                .filter(Value::is_object)
        };
        let Some(body) = doc else {
            debug!(len = bytes.len(), "status request returned the file directly");
            return Ok(PollResponse::File(bytes.to_vec()));
        };

        let status = RemoteJobStatus::parse(http::json_str(&body, "data.attributes.status")?);
        let download_url = http::json_str(&body, "data.links.download")
            .ok()
            .map(str::to_string);
        Ok(PollResponse::Status {
            status,
            download_url,
        })
    }

    /// Fetch a finished export with the credential-free client.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.download_http.get(url).send().await?;
        let resp = http::check_response(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Content types a TMX export may arrive with but a status document never does.
fn is_binary_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("application/octet-stream")
        || ct.contains("xml")
        || ct.contains("tmx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};
    use std::sync::Arc;

    fn client() -> TargetClient {
        let log = RunLogger::new(Arc::new(MemorySink::new()), LogLevel::Normal);
        TargetClient::new("https://rest.example.test/", "tok", "acme", "web", log).unwrap()
    }

    #[test]
    fn test_resource_ids() {
        let c = client();
        assert_eq!(c.project_id(), "o:acme:p:web");
        assert_eq!(c.resource_id("email_123"), "o:acme:p:web:r:email_123");
        assert_eq!(
            c.url("/resources"),
            "https://rest.example.test/resources"
        );
    }

    #[test]
    fn test_remote_status_parse() {
        assert_eq!(RemoteJobStatus::parse("pending"), RemoteJobStatus::Pending);
        assert_eq!(RemoteJobStatus::parse("processing"), RemoteJobStatus::Pending);
        assert_eq!(RemoteJobStatus::parse("completed"), RemoteJobStatus::Completed);
        assert_eq!(RemoteJobStatus::parse("failed"), RemoteJobStatus::Failed);
    }

    #[test]
    fn test_binary_content_types() {
        assert!(is_binary_content_type("application/octet-stream"));
        assert!(is_binary_content_type("application/xml; charset=utf-8"));
        assert!(is_binary_content_type("text/xml"));
        assert!(!is_binary_content_type("application/vnd.api+json"));
        assert!(!is_binary_content_type("text/plain"));
    }

    #[tokio::test]
    async fn test_upload_all_blank_makes_no_request() {
        // The API URL is unroutable; any request would fail the test.
        let c = client();
        let fields = vec![
            ("subject".to_string(), Some("  ".to_string())),
            ("preheader".to_string(), None),
            ("body".to_string(), Some(String::new())),
        ];
        let outcome = c.upload_content("email_1", &fields).await.unwrap();
        assert_eq!(outcome, UploadOutcome::SkippedBlank);
    }
}
