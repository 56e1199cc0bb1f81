//! In-process mock of the Source and Target APIs.
//!
//! One axum server answers both: Source under `/braze`, Target under `/tx`,
//! finished exports under `/files`. Every request is recorded so tests can
//! assert on the exact calls a run made.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

use locsync_core::config::AppConfig;
use locsync_core::CancellationToken;

pub const TMX_JOB_ID: &str = "tmx-job-1";
pub const TMX_BYTES: &[u8] = b"<?xml version=\"1.0\"?><tmx version=\"1.4\"></tmx>";

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

/// Reply to a TMX job status request.
#[derive(Debug, Clone)]
pub enum JobReply {
    Status(&'static str),
    /// A status document sent without a Content-Type header.
    UntypedStatus(&'static str),
    File,
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub email_templates: Vec<Value>,
    pub content_blocks: Vec<Value>,
    /// Item id → detail document.
    pub details: HashMap<String, Value>,
    /// Target resource id → name.
    pub resources: HashMap<String, String>,
    /// Replies for successive status polls; `pending` once exhausted.
    pub job_replies: VecDeque<JobReply>,
    pub fail_export_create: bool,
    pub fail_source_list: bool,
    pub omit_collection_key: bool,
    /// Trip this token when details for the given id are requested.
    pub cancel_on_details: Option<(String, CancellationToken)>,
}

#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn source_url(&self) -> String {
        format!("http://{}/braze", self.addr)
    }

    pub fn target_url(&self) -> String {
        format!("http://{}/tx", self.addr)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls with the given method whose path starts with `prefix`.
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .collect()
    }

    pub fn resource_name(&self, resource_id: &str) -> Option<String> {
        self.state.lock().unwrap().resources.get(resource_id).cloned()
    }

    /// Config pointing at this server, credentials already resolved.
    pub fn config(&self, backup_dir: Option<&Path>) -> AppConfig {
        let mut config: AppConfig = toml::from_str(&format!(
            r#"
[source]
endpoint = "{}"
api_key_env = "LOCSYNC_TEST_SOURCE_KEY"

[target]
api_url = "{}"
organization = "acme"
project = "web"
api_token_env = "LOCSYNC_TEST_TARGET_TOKEN"

[backup]
enabled = {}

[logging]
level = "Debug"
"#,
            self.source_url(),
            self.target_url(),
            backup_dir.is_some(),
        ))
        .unwrap();
        config.backup.dir = backup_dir.map(Path::to_path_buf);
        config.source.api_key = Some("source-key".into());
        config.target.api_token = Some("target-token".into());
        config
    }
}

pub fn resource_id(slug: &str) -> String {
    format!("o:acme:p:web:r:{}", slug)
}

pub fn template(id: &str, name: &str) -> Value {
    json!({"email_template_id": id, "template_name": name})
}

pub fn block(id: &str, name: &str) -> Value {
    json!({"content_block_id": id, "name": name})
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/vnd.api+json")],
        body.to_string(),
    )
        .into_response()
}

fn list_page(items: &[Value], key: &str, query: &str) -> Response {
    let limit: usize = query_param(query, "limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    let offset: usize = query_param(query, "offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let page: Vec<Value> = items.iter().skip(offset).take(limit).cloned().collect();
    let mut doc = serde_json::Map::new();
    doc.insert(key.to_string(), Value::Array(page));
    doc.insert("message".to_string(), json!("success"));
    json_response(StatusCode::OK, Value::Object(doc))
}

async fn handle(State(state): State<Arc<Mutex<MockState>>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let (host, authorization, user_agent) = {
        let header_str = |name: header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        (
            header_str(header::HOST).unwrap_or_else(|| "127.0.0.1".into()),
            header_str(header::AUTHORIZATION),
            header_str(header::USER_AGENT),
        )
    };
    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    let mut st = state.lock().unwrap();
    st.calls.push(Call {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
        authorization,
        user_agent,
    });

    match (method.as_str(), path.as_str()) {
        ("GET", "/braze/templates/email/list") | ("GET", "/braze/content_blocks/list") => {
            if st.fail_source_list {
                return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
            }
            if st.omit_collection_key {
                return json_response(StatusCode::OK, json!({"message": "success"}));
            }
            if path.contains("templates") {
                list_page(&st.email_templates, "templates", &query)
            } else {
                list_page(&st.content_blocks, "content_blocks", &query)
            }
        }
        ("GET", "/braze/templates/email/info") | ("GET", "/braze/content_blocks/info") => {
            let param = if path.contains("templates") {
                "email_template_id"
            } else {
                "content_block_id"
            };
            let id = query_param(&query, param).unwrap_or("").to_string();
            if let Some((trigger, token)) = &st.cancel_on_details {
                if *trigger == id {
                    token.cancel();
                }
            }
            match st.details.get(&id) {
                Some(doc) => json_response(StatusCode::OK, doc.clone()),
                None => json_response(StatusCode::OK, json!({})),
            }
        }
        ("GET", p) if p.starts_with("/tx/resources/") => {
            let id = p.trim_start_matches("/tx/resources/");
            match st.resources.get(id) {
                Some(name) => json_response(
                    StatusCode::OK,
                    json!({"data": {"type": "resources", "id": id, "attributes": {"name": name}}}),
                ),
                None => json_response(
                    StatusCode::NOT_FOUND,
                    json!({"errors": [{"status": "404", "code": "not_found"}]}),
                ),
            }
        }
        ("PATCH", p) if p.starts_with("/tx/resources/") => {
            let id = p.trim_start_matches("/tx/resources/").to_string();
            let name = body["data"]["attributes"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            st.resources.insert(id, name);
            json_response(StatusCode::OK, body)
        }
        ("POST", "/tx/resources") => {
            let slug = body["data"]["attributes"]["slug"].as_str().unwrap_or_default();
            let name = body["data"]["attributes"]["name"].as_str().unwrap_or_default();
            st.resources.insert(resource_id(slug), name.to_string());
            json_response(StatusCode::CREATED, body)
        }
        ("POST", "/tx/resource_strings_async_uploads") => json_response(
            StatusCode::ACCEPTED,
            json!({"data": {"id": "upload-1", "type": "resource_strings_async_uploads"}}),
        ),
        ("POST", "/tx/tmx_async_downloads") => {
            if st.fail_export_create {
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"errors": [{"detail": "export service unavailable"}]}),
                );
            }
            json_response(
                StatusCode::ACCEPTED,
                json!({"data": {"id": TMX_JOB_ID, "type": "tmx_async_downloads"}}),
            )
        }
        ("GET", p) if p == format!("/tx/tmx_async_downloads/{}", TMX_JOB_ID) => {
            let download = format!("http://{}/files/backup.tmx", host);
            match st.job_replies.pop_front() {
                Some(JobReply::File) => Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(Body::from(TMX_BYTES))
                    .unwrap(),
                Some(JobReply::UntypedStatus(status)) => Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from(
                        json!({"data": {
                            "id": TMX_JOB_ID,
                            "attributes": {"status": status},
                            "links": {"download": download},
                        }})
                        .to_string(),
                    ))
                    .unwrap(),
                Some(JobReply::Status(status)) => json_response(
                    StatusCode::OK,
                    json!({"data": {
                        "id": TMX_JOB_ID,
                        "attributes": {"status": status},
                        "links": {"download": download},
                    }}),
                ),
                None => json_response(
                    StatusCode::OK,
                    json!({"data": {"id": TMX_JOB_ID, "attributes": {"status": "pending"}}}),
                ),
            }
        }
        ("GET", "/files/backup.tmx") => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(TMX_BYTES))
            .unwrap(),
        _ => (StatusCode::NOT_FOUND, "no such route").into_response(),
    }
}
