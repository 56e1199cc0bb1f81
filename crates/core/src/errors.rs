//! Error types for the locsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// API errors (shared by the Source and Target clients)
// ---------------------------------------------------------------------------

/// Errors from a single HTTP exchange with Source or Target.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connect, TLS or timeout failure before a response was received.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote system answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// A response was missing a field the protocol requires.
    #[error("unexpected response shape: missing field '{field}'")]
    UnexpectedShape { field: String },

    /// A response body was not the JSON document we expected.
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A credential could not be encoded as an HTTP header.
    #[error("invalid header value for '{0}'")]
    InvalidHeader(&'static str),
}

impl ApiError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            field: field.into(),
        }
    }

    /// Human-readable response details for fatal log output.
    ///
    /// JSON bodies are pretty-printed; anything else is returned verbatim.
    pub fn body_details(&self) -> Option<String> {
        match self {
            Self::Status { body, .. } if !body.trim().is_empty() => {
                match serde_json::from_str::<serde_json::Value>(body) {
                    Ok(value) => Some(
                        serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.clone()),
                    ),
                    Err(_) => Some(body.clone()),
                }
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Backup errors
// ---------------------------------------------------------------------------

/// Errors from the TMX backup job.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Transport or protocol failure while talking to Target.
    #[error("backup API error: {0}")]
    Api(#[from] ApiError),

    /// Target reported the export job as failed.
    #[error("Target reported backup job {job_id} as failed")]
    JobFailed { job_id: String },

    /// The job did not complete before the polling deadline.
    #[error("backup job {job_id} timed out after {secs}s")]
    TimedOut { job_id: String, secs: u64 },

    /// The cancellation token was tripped while waiting for the job.
    #[error("backup cancelled")]
    Cancelled,

    /// The backup file could not be written.
    #[error("backup I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The run was stopped by the cancellation token. Not a failure.
    #[error("sync cancelled by user")]
    Cancelled,

    /// A Source or Target call failed.
    #[error("sync API error: {0}")]
    Api(#[from] ApiError),

    /// The backup precondition failed; nothing was synced.
    #[error("sync halted, backup failed: {0}")]
    Backup(BackupError),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<BackupError> for SyncError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::Cancelled => SyncError::Cancelled,
            other => SyncError::Backup(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ApiError::missing("data.id");
        assert_eq!(
            err.to_string(),
            "unexpected response shape: missing field 'data.id'"
        );

        let err = BackupError::TimedOut {
            job_id: "job-1".into(),
            secs: 300,
        };
        assert!(err.to_string().contains("timed out after 300s"));

        let err = ConfigError::EnvVarMissing {
            var: "BRAZE_API_KEY".into(),
            field: "source.api_key_env".into(),
        };
        assert!(err.to_string().contains("BRAZE_API_KEY"));
    }

    #[test]
    fn test_body_details_pretty_prints_json() {
        let err = ApiError::Status {
            status: 400,
            url: "https://example.test/resources".into(),
            body: r#"{"errors":[{"detail":"bad slug"}]}"#.into(),
        };
        let details = err.body_details().unwrap();
        assert!(details.contains("\"detail\": \"bad slug\""));
    }

    #[test]
    fn test_body_details_raw_text() {
        let err = ApiError::Status {
            status: 502,
            url: "https://example.test".into(),
            body: "<html>Bad Gateway</html>".into(),
        };
        assert_eq!(err.body_details().as_deref(), Some("<html>Bad Gateway</html>"));

        let empty = ApiError::Status {
            status: 500,
            url: "https://example.test".into(),
            body: "  ".into(),
        };
        assert!(empty.body_details().is_none());
    }

    #[test]
    fn test_backup_cancel_maps_to_sync_cancel() {
        let err: SyncError = BackupError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: SyncError = BackupError::JobFailed {
            job_id: "j".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Backup(_)));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core: CoreError = SyncError::Cancelled.into();
        assert!(matches!(core, CoreError::Sync(_)));
        let core: CoreError = ApiError::missing("x").into();
        assert!(matches!(core, CoreError::Api(_)));
    }
}
