//! Domain model types shared by the clients, the backup job and the engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Item kinds
// ---------------------------------------------------------------------------

/// The Source collections that carry translatable content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    EmailTemplate,
    ContentBlock,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::EmailTemplate, ItemKind::ContentBlock];

    /// Path of the paginated list endpoint.
    pub fn list_path(self) -> &'static str {
        match self {
            Self::EmailTemplate => "/templates/email/list",
            Self::ContentBlock => "/content_blocks/list",
        }
    }

    /// Key of the array holding the items in a list response.
    pub fn collection_key(self) -> &'static str {
        match self {
            Self::EmailTemplate => "templates",
            Self::ContentBlock => "content_blocks",
        }
    }

    /// Path of the per-item detail endpoint.
    pub fn info_path(self) -> &'static str {
        match self {
            Self::EmailTemplate => "/templates/email/info",
            Self::ContentBlock => "/content_blocks/info",
        }
    }

    /// Query parameter carrying the item id on the detail endpoint.
    pub fn id_param(self) -> &'static str {
        match self {
            Self::EmailTemplate => "email_template_id",
            Self::ContentBlock => "content_block_id",
        }
    }

    /// Translatable fields, in upload order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::EmailTemplate => &["subject", "preheader", "body"],
            Self::ContentBlock => &["content"],
        }
    }

    fn summary_id_keys(self) -> &'static [&'static str] {
        match self {
            Self::EmailTemplate => &["email_template_id", "id"],
            Self::ContentBlock => &["content_block_id", "id"],
        }
    }

    fn summary_name_keys(self) -> &'static [&'static str] {
        match self {
            Self::EmailTemplate => &["template_name", "name"],
            Self::ContentBlock => &["name"],
        }
    }

    /// Plural label used in log output.
    pub fn label(self) -> &'static str {
        match self {
            Self::EmailTemplate => "email templates",
            Self::ContentBlock => "content blocks",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailTemplate => write!(f, "email_template"),
            Self::ContentBlock => write!(f, "content_block"),
        }
    }
}

// ---------------------------------------------------------------------------
// Source items
// ---------------------------------------------------------------------------

/// One entry of a Source list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    pub id: String,
    pub display_name: String,
}

impl ItemSummary {
    /// Extract id and display name from a raw list entry.
    ///
    /// Returns `None` when either is missing, empty or not a string.
    pub fn from_value(kind: ItemKind, value: &Value) -> Option<Self> {
        let pick = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| value.get(*k).and_then(Value::as_str))
                .find(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Some(Self {
            id: pick(kind.summary_id_keys())?,
            display_name: pick(kind.summary_name_keys())?,
        })
    }
}

/// Ordered field values of one item, keyed by the kind's declared field list.
pub type FieldValues = Vec<(String, Option<String>)>;

/// A Source item with its translatable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableItem {
    pub kind: ItemKind,
    pub id: String,
    pub display_name: String,
    pub fields: FieldValues,
}

impl TranslatableItem {
    pub fn new(kind: ItemKind, summary: ItemSummary, fields: FieldValues) -> Self {
        Self {
            kind,
            id: summary.id,
            display_name: summary.display_name,
            fields,
        }
    }

    /// The Target resource slug. Derived from the Source id and never changed.
    pub fn slug(&self) -> &str {
        &self.id
    }
}

/// Keep only the fields whose value is present and non-blank after trimming.
///
/// Values are kept untrimmed and in declared order.
pub fn non_blank_fields(fields: &[(String, Option<String>)]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(name, value)| match value {
            Some(v) if !v.trim().is_empty() => Some((name.clone(), Value::String(v.clone()))),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Target reconciliation outcomes
// ---------------------------------------------------------------------------

/// What `ensure_resource` had to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    Created,
    Renamed,
    Unchanged,
}

/// What `upload_content` did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// An async upload job was accepted.
    Started,
    /// Every field was blank; nothing was sent.
    SkippedBlank,
    /// The identical payload was already uploaded to this resource.
    SkippedUnchanged,
}

// ---------------------------------------------------------------------------
// Backup job
// ---------------------------------------------------------------------------

/// Lifecycle of a TMX export job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Created,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl BackupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Polling => write!(f, "polling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Observable state of a backup job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupJobState {
    pub id: String,
    pub status: BackupStatus,
    pub download_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Statistics from a single sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: String,
    pub email_templates: usize,
    pub content_blocks: usize,
    pub skipped_entries: usize,
    pub resources_created: usize,
    pub resources_renamed: usize,
    pub resources_unchanged: usize,
    pub uploads_started: usize,
    pub uploads_skipped: usize,
    pub backup_file: Option<PathBuf>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn record_resource(&mut self, action: ResourceAction) {
        match action {
            ResourceAction::Created => self.resources_created += 1,
            ResourceAction::Renamed => self.resources_renamed += 1,
            ResourceAction::Unchanged => self.resources_unchanged += 1,
        }
    }

    pub fn record_upload(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Started => self.uploads_started += 1,
            UploadOutcome::SkippedBlank | UploadOutcome::SkippedUnchanged => {
                self.uploads_skipped += 1
            }
        }
    }

    pub fn record_item(&mut self, kind: ItemKind) {
        match kind {
            ItemKind::EmailTemplate => self.email_templates += 1,
            ItemKind::ContentBlock => self.content_blocks += 1,
        }
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(SyncReport),
    /// Stopped by the cancellation token; the partial report is kept.
    Cancelled(SyncReport),
}

impl RunOutcome {
    pub fn report(&self) -> &SyncReport {
        match self {
            Self::Completed(r) | Self::Cancelled(r) => r,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
