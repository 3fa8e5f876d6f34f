//! SLA violations: recorded deadline breaches and near-breaches.
//!
//! At most one violation per process is open at any time. A worse
//! detection upgrades the open record in place; severity never goes back
//! down. Acknowledging hands the record to a human without closing it;
//! resolving closes it for good.

use crate::identity::Identity;
use crate::process::ProcessId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Violation identifier ─────────────────────────────────────────────

/// Unique identifier for a recorded SLA violation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViolationId(pub String);

impl ViolationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for ViolationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Severity ─────────────────────────────────────────────────────────

/// How badly the deadline is threatened. Ordering drives in-place upgrades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Half or less of the time budget remains.
    Warning,
    /// A fifth or less of the time budget remains.
    Critical,
    /// The deadline has passed.
    Overdue,
}

impl ViolationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Warning => "warning",
            ViolationSeverity::Critical => "critical",
            ViolationSeverity::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Resolution state ─────────────────────────────────────────────────

/// Where the violation sits in its handling lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViolationState {
    /// Detected and unhandled.
    #[default]
    Active,
    /// A human has taken note but not yet closed it.
    Acknowledged,
    /// Closed, either by a human or by the process reaching a terminal
    /// status.
    Resolved,
}

impl ViolationState {
    /// Open states still tied to a live concern.
    pub fn is_open(&self) -> bool {
        matches!(self, ViolationState::Active | ViolationState::Acknowledged)
    }
}

// ── Violation ────────────────────────────────────────────────────────

/// A detected SLA breach or near-breach tied to exactly one process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Violation {
    /// Unique violation identifier.
    pub id: ViolationId,
    /// The process whose deadline is threatened.
    pub process_id: ProcessId,
    /// Current severity. Upgraded in place, never lowered.
    pub severity: ViolationSeverity,
    /// Handling state.
    pub state: ViolationState,
    /// Human-readable description of the detection.
    pub message: String,
    /// When the violation was first detected.
    pub detected_at: DateTime<Utc>,
    /// Who acknowledged it, if anyone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Remark recorded at acknowledgement time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledgement_comment: Option<String>,
    /// Who resolved it, if anyone. System resolutions use a system identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Closing comment recorded at resolution time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_comment: Option<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Violation {
    pub fn new(
        process_id: ProcessId,
        severity: ViolationSeverity,
        message: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ViolationId::generate(),
            process_id,
            severity,
            state: ViolationState::Active,
            message: message.into(),
            detected_at,
            acknowledged_by: None,
            acknowledged_at: None,
            acknowledgement_comment: None,
            resolved_by: None,
            resolved_at: None,
            resolution_comment: None,
            updated_at: detected_at,
        }
    }

    /// Raise severity in place. Callers only invoke this for a strictly
    /// worse detection; the message is replaced to describe it.
    pub fn upgrade(
        &mut self,
        severity: ViolationSeverity,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.severity = severity;
        self.message = message.into();
        self.updated_at = at;
    }

    /// Mark as seen by a human without closing it.
    pub fn acknowledge(&mut self, by: Identity, comment: Option<String>, at: DateTime<Utc>) {
        self.state = ViolationState::Acknowledged;
        self.acknowledged_by = Some(by);
        self.acknowledged_at = Some(at);
        self.acknowledgement_comment = comment;
        self.updated_at = at;
    }

    /// Close the violation.
    pub fn resolve(&mut self, by: Identity, comment: Option<String>, at: DateTime<Utc>) {
        self.state = ViolationState::Resolved;
        self.resolved_by = Some(by);
        self.resolved_at = Some(at);
        self.resolution_comment = comment;
        self.updated_at = at;
    }

    pub fn is_active(&self) -> bool {
        self.state == ViolationState::Active
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation() -> Violation {
        Violation::new(
            ProcessId::generate(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        )
    }

    #[test]
    fn severity_ordering_supports_upgrades() {
        assert!(ViolationSeverity::Warning < ViolationSeverity::Critical);
        assert!(ViolationSeverity::Critical < ViolationSeverity::Overdue);
    }

    #[test]
    fn new_violation_starts_active() {
        let violation = make_violation();
        assert!(violation.is_active());
        assert!(violation.is_open());
        assert!(violation.resolved_at.is_none());
    }

    #[test]
    fn upgrade_replaces_severity_and_message() {
        let mut violation = make_violation();
        let at = Utc::now();
        violation.upgrade(ViolationSeverity::Critical, "a fifth left", at);

        assert_eq!(violation.severity, ViolationSeverity::Critical);
        assert_eq!(violation.message, "a fifth left");
        assert!(violation.is_active());
    }

    #[test]
    fn acknowledge_keeps_violation_open() {
        let mut violation = make_violation();
        violation.acknowledge(
            Identity::new("supervisor-1"),
            Some("chasing the lab".to_string()),
            Utc::now(),
        );

        assert_eq!(violation.state, ViolationState::Acknowledged);
        assert!(!violation.is_active());
        assert!(violation.is_open());
        assert_eq!(
            violation.acknowledgement_comment.as_deref(),
            Some("chasing the lab")
        );
    }

    #[test]
    fn resolve_closes_with_comment() {
        let mut violation = make_violation();
        violation.resolve(
            Identity::new("supervisor-1"),
            Some("batch approved".to_string()),
            Utc::now(),
        );

        assert_eq!(violation.state, ViolationState::Resolved);
        assert!(!violation.is_open());
        assert_eq!(violation.resolution_comment.as_deref(), Some("batch approved"));
    }
}
