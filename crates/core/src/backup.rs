//! Full-project TMX backup.
//!
//! [`BackupJob`] drives Target's asynchronous export:
//!
//! `Created → Polling → Completed | Failed | TimedOut | Cancelled`
//!
//! The job is created with one POST, then polled with exponential backoff
//! until it completes, fails, or the deadline passes. The resulting file is
//! written to the backup directory. Every failure is returned to the caller;
//! the sync treats a failed backup as fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::errors::{ApiError, BackupError};
use crate::logging::{Progress, RunLogger};
use crate::models::{BackupJobState, BackupStatus};
use crate::target::{PollResponse, RemoteJobStatus, TargetClient};

/// Timing of the status poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Give up this long after polling starts.
    pub timeout: Duration,
    /// First wait between polls.
    pub initial_backoff: Duration,
    /// Upper bound for the doubling backoff.
    pub max_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_backoff)
    }
}

/// One TMX export of the configured project.
pub struct BackupJob<'a> {
    target: &'a TargetClient,
    clock: Arc<dyn Clock>,
    log: RunLogger,
    progress: Progress,
    policy: PollPolicy,
    backup_dir: PathBuf,
    state: BackupJobState,
}

impl<'a> BackupJob<'a> {
    pub fn new(
        target: &'a TargetClient,
        backup_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        log: RunLogger,
        progress: Progress,
    ) -> Self {
        Self {
            target,
            clock,
            log,
            progress,
            policy: PollPolicy::default(),
            backup_dir: backup_dir.into(),
            state: BackupJobState {
                id: String::new(),
                status: BackupStatus::Created,
                download_url: None,
            },
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &BackupJobState {
        &self.state
    }

    fn transition(&mut self, status: BackupStatus) {
        debug!(job_id = %self.state.id, from = %self.state.status, to = %status, "backup state");
        self.state.status = status;
    }

    /// Create, poll, download and persist. Returns the written file.
    #[instrument(skip(self, cancel), fields(project = %self.target.project()))]
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<PathBuf, BackupError> {
        self.log.info("--- Starting TMX Backup ---");
        if cancel.is_cancelled() {
            self.transition(BackupStatus::Cancelled);
            return Err(BackupError::Cancelled);
        }
        self.create().await?;
        let content = self.poll(cancel).await?;
        let path = self.persist(&content).await?;
        self.log
            .info(format!("  > SUCCESS: Backup saved to {}", path.display()));
        Ok(path)
    }

    /// Start the export job and move to `Polling`.
    pub async fn create(&mut self) -> Result<(), BackupError> {
        self.log
            .info("  > Requesting TMX file for all languages from Target...");
        self.progress.report("Requesting TMX backup");
        match self.target.start_tmx_export().await {
            Ok(job_id) => {
                self.state.id = job_id;
                self.log.info(format!(
                    "  > Backup job created successfully. ID: {}",
                    self.state.id
                ));
                self.transition(BackupStatus::Polling);
                Ok(())
            }
            Err(e) => {
                self.transition(BackupStatus::Failed);
                Err(e.into())
            }
        }
    }

    /// Poll until the export is ready and return its bytes.
    pub async fn poll(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>, BackupError> {
        self.log
            .info("  > Waiting for Target to process the file...");
        let deadline = self.clock.now() + self.policy.timeout;
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                self.transition(BackupStatus::Cancelled);
                return Err(BackupError::Cancelled);
            }
            if self.clock.now() >= deadline {
                self.transition(BackupStatus::TimedOut);
                self.log.error(format!(
                    "TMX backup job timed out after {} seconds.",
                    self.policy.timeout.as_secs()
                ));
                return Err(BackupError::TimedOut {
                    job_id: self.state.id.clone(),
                    secs: self.policy.timeout.as_secs(),
                });
            }

            attempt += 1;
            self.progress
                .report(format!("Waiting for backup (check {})", attempt));
            let response = match self.target.tmx_job_status(&self.state.id).await {
                Ok(r) => r,
                Err(e) => return Err(self.fail(e)),
            };

            match response {
                PollResponse::File(content) => {
                    self.log
                        .info("  > Received the TMX file directly from the status endpoint.");
                    self.transition(BackupStatus::Completed);
                    return Ok(content);
                }
                PollResponse::Status {
                    status: RemoteJobStatus::Completed,
                    download_url,
                } => {
                    let Some(url) = download_url else {
                        return Err(self.fail(ApiError::missing("data.links.download")));
                    };
                    self.log.info("  > File ready for download.");
                    self.state.download_url = Some(url.clone());
                    self.progress.report("Downloading TMX backup");
                    let content = match self.target.download(&url).await {
                        Ok(c) => c,
                        Err(e) => return Err(self.fail(e)),
                    };
                    self.transition(BackupStatus::Completed);
                    return Ok(content);
                }
                PollResponse::Status {
                    status: RemoteJobStatus::Failed,
                    ..
                } => {
                    self.transition(BackupStatus::Failed);
                    self.log.error("Target reported the backup job failed.");
                    return Err(BackupError::JobFailed {
                        job_id: self.state.id.clone(),
                    });
                }
                PollResponse::Status {
                    status: RemoteJobStatus::Pending,
                    ..
                } => {
                    // Never sleep past the deadline.
                    let wait = backoff.min(deadline.saturating_duration_since(self.clock.now()));
                    self.log.debug(format!(
                        "Current job status: 'pending'. Polling again in {}s.",
                        wait.as_secs()
                    ));
                    self.clock.sleep(wait).await;
                    backoff = self.policy.next_backoff(backoff);
                }
            }
        }
    }

    fn fail(&mut self, err: ApiError) -> BackupError {
        warn!(job_id = %self.state.id, error = %err, "backup job request failed");
        self.transition(BackupStatus::Failed);
        BackupError::Api(err)
    }

    /// Write the export to `{dir}/backup_{project}_all_languages_{timestamp}.tmx`.
    pub async fn persist(&self, content: &[u8]) -> Result<PathBuf, BackupError> {
        tokio::fs::create_dir_all(&self.backup_dir).await?;
        let path = backup_file_path(&self.backup_dir, self.target.project());
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), bytes = content.len(), "backup written");
        Ok(path)
    }
}

/// Backup file name for `project`, timestamped with local time.
pub fn backup_file_path(dir: &Path, project: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("backup_{}_all_languages_{}.tmx", project, timestamp))
}
