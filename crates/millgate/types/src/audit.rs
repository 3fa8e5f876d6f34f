//! Append-only audit facts.
//!
//! Every logical change to a process pairs with exactly one audit entry.
//! Entries are never updated or deleted; the store assigns each one a dense
//! global sequence and chains record hashes so tampering is detectable.

use crate::identity::Identity;
use crate::process::{ProcessId, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Action kinds ─────────────────────────────────────────────────────

/// What kind of fact an audit entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Process record created.
    Created,
    /// A stage owner was picked.
    Assigned,
    /// Work at a stage began.
    Started,
    /// Work at a stage finished.
    Completed,
    /// Process cancelled before completion.
    Cancelled,
    /// Priority raised and deadline recomputed.
    Escalated,
    /// Stage owner changed by hand.
    Reassigned,
    /// Process stopped by an unrecoverable failure.
    Failed,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Created => "created",
            ActionKind::Assigned => "assigned",
            ActionKind::Started => "started",
            ActionKind::Completed => "completed",
            ActionKind::Cancelled => "cancelled",
            ActionKind::Escalated => "escalated",
            ActionKind::Reassigned => "reassigned",
            ActionKind::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Audit append request ─────────────────────────────────────────────

/// What a caller supplies to append an audit entry. The store adds the
/// entry id, sequence and hash chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditAppend {
    /// The process this fact belongs to.
    pub process_id: ProcessId,
    /// The stage the process was in when the fact occurred.
    pub stage: Stage,
    /// Kind of fact.
    pub action: ActionKind,
    /// Who performed or caused it.
    pub performer: Identity,
    /// Who it was directed at, for assignments and reassignments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Identity>,
    /// When it occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-text remark from the performer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Structured context (requirement reasons, degradation markers, …).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    /// Stage duration for `completed` entries, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

impl AuditAppend {
    pub fn new(
        process_id: ProcessId,
        stage: Stage,
        action: ActionKind,
        performer: Identity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            process_id,
            stage,
            action,
            performer,
            target: None,
            timestamp,
            comment: None,
            metadata: serde_json::Value::Null,
            duration_secs: None,
        }
    }

    pub fn with_target(mut self, target: Identity) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

// ── Audit entry ──────────────────────────────────────────────────────

/// One immutable, timestamped fact in a process's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned entry identifier.
    pub entry_id: String,
    /// Dense global append sequence; orders ties within one timestamp.
    pub sequence: u64,
    /// The process this fact belongs to.
    pub process_id: ProcessId,
    /// The stage the process was in when the fact occurred.
    pub stage: Stage,
    /// Kind of fact.
    pub action: ActionKind,
    /// Who performed or caused it.
    pub performer: Identity,
    /// Who it was directed at, for assignments and reassignments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Identity>,
    /// When it occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-text remark from the performer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Structured context.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    /// Stage duration for `completed` entries, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    /// Hash of the previous entry in the chain. `None` for the first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    /// Hash over this entry's content and the previous hash.
    pub hash: String,
}
