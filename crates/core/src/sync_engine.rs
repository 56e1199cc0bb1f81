//! Source → Target synchronization engine.
//!
//! [`SyncOrchestrator`] runs one sync end to end:
//!
//! 1. Optionally take a full TMX backup of the Target project. A failed
//!    backup halts the run before Source is contacted.
//! 2. Enumerate Source email templates; for each, fetch its fields, make sure
//!    the matching Target resource exists with the right name, and upload the
//!    non-blank fields.
//! 3. Do the same for content blocks.
//!
//! Every call is sequential. The [`CancellationToken`] is checked before each
//! list page, each item and each backup poll; a tripped token ends the run
//! cleanly with [`RunOutcome::Cancelled`]. Changes already made in Target are
//! kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};

use crate::backup::{BackupJob, PollPolicy};
use crate::cancel::CancellationToken;
use crate::clock::{Clock, TokioClock};
use crate::config::AppConfig;
use crate::errors::{ApiError, BackupError, CoreError, SyncError};
use crate::logging::{LogSink, NoProgress, Progress, ProgressSink, RunLogger};
use crate::models::{ItemKind, ItemSummary, RunOutcome, SyncReport, TranslatableItem};
use crate::source::SourceClient;
use crate::target::TargetClient;

/// The host-provided collaborators of a run.
#[derive(Clone)]
pub struct RunContext {
    pub log: Arc<dyn LogSink>,
    pub progress: Arc<dyn ProgressSink>,
    pub clock: Arc<dyn Clock>,
}

impl RunContext {
    /// Real clock, no progress reporting.
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            log,
            progress: Arc::new(NoProgress),
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Runs backups and syncs for one configured project.
pub struct SyncOrchestrator {
    config: AppConfig,
    source: SourceClient,
    target: TargetClient,
    clock: Arc<dyn Clock>,
    log: RunLogger,
    progress: Progress,
    poll_policy: PollPolicy,
}

impl SyncOrchestrator {
    /// Build the orchestrator and its clients from a validated config.
    pub fn new(config: AppConfig, ctx: RunContext) -> Result<Self, CoreError> {
        config.validate()?;
        let log = RunLogger::new(ctx.log, config.logging.level);
        let progress = Progress::new(ctx.progress);

        let source = SourceClient::new(
            config.source.endpoint.clone(),
            config.source_api_key()?,
            ctx.clock.clone(),
            log.clone(),
            progress.clone(),
        )?;
        let target = TargetClient::new(
            config.target.api_url.clone(),
            config.target_api_token()?,
            config.target.organization.clone(),
            config.target.project.clone(),
            log.clone(),
        )?;

        info!(project = %config.project_id(), "initializing sync orchestrator");
        Ok(Self {
            config,
            source,
            target,
            clock: ctx.clock,
            log,
            progress,
            poll_policy: PollPolicy::default(),
        })
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn target(&self) -> &TargetClient {
        &self.target
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Execute one full run.
    ///
    /// Cancellation is not an error: it yields `Ok(RunOutcome::Cancelled)`.
    /// Any other failure has already been written to the run log as a fatal
    /// error when this returns `Err`.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunOutcome, SyncError> {
        let mut report = SyncReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        let span = info_span!("sync_run", run_id = %report.run_id);

        self.log.info("--- Starting Source to Target Sync ---");
        let result = self.execute(&mut report, cancel).instrument(span).await;
        report.completed_at = Some(Utc::now());

        match result {
            Ok(()) => {
                self.log.info("--- Sync Complete! ---");
                self.progress.report("Sync complete");
                info!(
                    run_id = %report.run_id,
                    created = report.resources_created,
                    renamed = report.resources_renamed,
                    uploads = report.uploads_started,
                    "sync run finished"
                );
                Ok(RunOutcome::Completed(report))
            }
            Err(SyncError::Cancelled) => {
                self.log.info("--- Sync stopped by user. ---");
                self.progress.report("Sync cancelled");
                info!(run_id = %report.run_id, "sync run cancelled");
                Ok(RunOutcome::Cancelled(report))
            }
            Err(e) => {
                error!(run_id = %report.run_id, error = %e, "sync run failed");
                self.log_failure(&e);
                self.progress.report("Sync failed");
                Err(e)
            }
        }
    }

    /// Run only the TMX backup into `dir`.
    pub async fn run_backup(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, BackupError> {
        let mut job = BackupJob::new(
            &self.target,
            dir,
            self.clock.clone(),
            self.log.clone(),
            self.progress.clone(),
        )
        .with_policy(self.poll_policy);
        job.run(cancel).await
    }

    /// Backup-only run, reported through the run log like a full sync.
    ///
    /// Returns `Ok(None)` when cancelled.
    pub async fn backup_only(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>, BackupError> {
        match self.run_backup(dir, cancel).await {
            Ok(path) => {
                self.progress.report("Backup complete");
                Ok(Some(path))
            }
            Err(BackupError::Cancelled) => {
                self.log.info("--- Backup stopped by user. ---");
                Ok(None)
            }
            Err(e) => {
                error!(error = %e, "backup failed");
                self.log_backup_error(&e);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        report: &mut SyncReport,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        cancel.check()?;

        match (self.config.backup.enabled, self.config.backup.dir.as_deref()) {
            (true, Some(dir)) => {
                let path = self.run_backup(dir, cancel).await?;
                report.backup_file = Some(path);
                self.log
                    .info("--- TMX Backup complete. Proceeding with sync. ---");
            }
            _ => self.log.info("TMX backup is disabled. Skipping."),
        }

        for (step, kind) in ItemKind::ALL.into_iter().enumerate() {
            self.sync_kind(step + 1, kind, report, cancel).await?;
        }
        Ok(())
    }

    async fn sync_kind(
        &self,
        step: usize,
        kind: ItemKind,
        report: &mut SyncReport,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        self.log
            .info(format!("[{}] Processing {}...", step, capitalize(kind.label())));
        let listing = self.source.list_all(kind, cancel).await?;
        report.skipped_entries += listing.skipped;

        for summary in listing.items {
            cancel.check()?;
            self.sync_item(kind, summary, report).await?;
        }
        Ok(())
    }

    /// Details → reconcile → upload for one item.
    async fn sync_item(
        &self,
        kind: ItemKind,
        summary: ItemSummary,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        self.log.info(format!(
            "Processing '{}' (ID: {})...",
            summary.display_name, summary.id
        ));
        self.progress
            .report(format!("Processing '{}'", summary.display_name));

        let fields = self.source.get_details(kind, &summary.id).await?;
        let item = TranslatableItem::new(kind, summary, fields);

        let action = self
            .target
            .ensure_resource(item.slug(), &item.display_name)
            .await?;
        report.record_resource(action);

        self.progress
            .report(format!("Uploading '{}'", item.display_name));
        let outcome = self.target.upload_content(item.slug(), &item.fields).await?;
        report.record_upload(outcome);
        report.record_item(kind);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Failure reporting
    // -----------------------------------------------------------------------

    fn log_failure(&self, err: &SyncError) {
        match err {
            SyncError::Backup(backup) => {
                self.log_backup_error(backup);
                self.log.info("--- Sync halted due to backup failure. ---");
            }
            SyncError::Api(api) => {
                self.log
                    .fatal("An unexpected error occurred during the main sync process.");
                self.log_api_error(api);
                self.log
                    .error("Please check your settings and network connection.");
            }
            SyncError::Cancelled => self.log.info("--- Sync stopped by user. ---"),
        }
    }

    fn log_backup_error(&self, err: &BackupError) {
        self.log.fatal("TMX backup failed");
        match err {
            BackupError::Api(api) => self.log_api_error(api),
            other => self.log.error(format!("Error: {}", other)),
        }
    }

    fn log_api_error(&self, err: &ApiError) {
        match err {
            ApiError::Status { status, url, .. } => {
                self.log.error(format!("Status Code: {}", status));
                self.log.error(format!("URL: {}", url));
                if let Some(details) = err.body_details() {
                    self.log.error(format!("Response Body: {}", details));
                }
            }
            ApiError::UnexpectedShape { field } => {
                self.log.error(format!(
                    "Received an unexpected response from an API: missing field '{}'",
                    field
                ));
            }
            ApiError::Network(e) => self.log.error(format!("Network error: {}", e)),
            other => self.log.error(format!("Error: {}", other)),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
