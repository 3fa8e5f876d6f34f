//! Pipeline processes: one in-flight inspection run per material batch.
//!
//! A `Process` is the durable record the engine advances. It carries the
//! current stage and owner, the computed deadline, the requirement flags
//! resolved at start, and append-only note trails. All mutators take the
//! effective timestamp from the caller so transitions stay replayable.

use crate::identity::{Identity, RoleTag};
use crate::material::{BatchIntake, BatchIntakeId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Process identifier ───────────────────────────────────────────────

/// Unique identifier for a pipeline process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub String);

impl ProcessId {
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

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Priority ─────────────────────────────────────────────────────────

/// Process priority. Ordering matters: escalation walks one step up the
/// ladder and `Urgent` is its fixed point.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// One step up the escalation ladder.
    pub fn escalated(self) -> Priority {
        match self {
            Priority::Low => Priority::Normal,
            Priority::Normal => Priority::High,
            Priority::High => Priority::Urgent,
            Priority::Urgent => Priority::Urgent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Lifecycle status ─────────────────────────────────────────────────

/// Lifecycle status of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Created but not yet activated.
    #[default]
    Draft,
    /// Moving through the pipeline.
    Active,
    /// Reached final approval.
    Completed,
    /// Explicitly cancelled before completion.
    Cancelled,
    /// Stopped by an unrecoverable stage failure or corruption.
    Error,
}

impl ProcessStatus {
    /// Terminal statuses never re-enter `Active` and take no further
    /// audit entries.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed | ProcessStatus::Cancelled | ProcessStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Draft => "draft",
            ProcessStatus::Active => "active",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Cancelled => "cancelled",
            ProcessStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Stages ───────────────────────────────────────────────────────────

/// One named step of the fixed pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Goods-in registration of the batch.
    Intake,
    /// Visual and dimensional inspection by quality control.
    QcInspection,
    /// Extended chemical and mechanical testing (conditional).
    ChemicalTesting,
    /// Ultrasonic or similar nondestructive testing (conditional).
    NondestructiveTesting,
    /// Release preparation for production use.
    ProductionPrep,
    /// Final sign-off.
    Approval,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Intake,
        Stage::QcInspection,
        Stage::ChemicalTesting,
        Stage::NondestructiveTesting,
        Stage::ProductionPrep,
        Stage::Approval,
    ];

    /// Stable stage identifier used in audit entries and logs.
    pub fn id(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::QcInspection => "qc_inspection",
            Stage::ChemicalTesting => "chemical_testing",
            Stage::NondestructiveTesting => "nondestructive_testing",
            Stage::ProductionPrep => "production_prep",
            Stage::Approval => "approval",
        }
    }

    /// Human-readable stage title.
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Intake => "Material intake",
            Stage::QcInspection => "QC inspection",
            Stage::ChemicalTesting => "Extended chemical testing",
            Stage::NondestructiveTesting => "Nondestructive testing",
            Stage::ProductionPrep => "Production preparation",
            Stage::Approval => "Final approval",
        }
    }

    /// The responsibility role owning work at this stage.
    pub fn responsible_role(&self) -> RoleTag {
        match self {
            Stage::Intake => RoleTag::Warehouse,
            Stage::QcInspection => RoleTag::Quality,
            Stage::ChemicalTesting => RoleTag::Laboratory,
            Stage::NondestructiveTesting => RoleTag::Laboratory,
            Stage::ProductionPrep => RoleTag::Production,
            Stage::Approval => RoleTag::Supervision,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ── Requirement flags ────────────────────────────────────────────────

/// Which conditional stages apply to a batch. Resolved exactly once when
/// the process starts and frozen afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequirementFlags {
    /// Extended chemical and mechanical testing required.
    pub extended_chemical: bool,
    /// Nondestructive testing required.
    pub nondestructive: bool,
}

impl RequirementFlags {
    pub fn none() -> Self {
        Self::default()
    }

    /// Number of conditional stages that apply.
    pub fn conditional_count(&self) -> u8 {
        self.extended_chemical as u8 + self.nondestructive as u8
    }
}

// ── SLA status ───────────────────────────────────────────────────────

/// Deadline health of a process, from the remaining/total time ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// More than half the budget remains.
    Ok,
    /// Half or less of the budget remains.
    Warning,
    /// A fifth or less of the budget remains.
    Critical,
    /// Deadline passed.
    Overdue,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::Ok => "ok",
            SlaStatus::Warning => "warning",
            SlaStatus::Critical => "critical",
            SlaStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Process ──────────────────────────────────────────────────────────

/// One in-flight run of the inspection pipeline, bound 1:1 to a batch
/// intake record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Process {
    /// Unique process identifier.
    pub id: ProcessId,
    /// The goods-in record this process inspects.
    pub intake_id: BatchIntakeId,
    /// Material grade, copied from the intake record.
    pub material_grade: String,
    /// Material size designation, copied from the intake record.
    pub material_size: String,
    /// Who requested the inspection.
    pub requester: Identity,
    /// Current stage owner. Cleared on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Identity>,
    /// Current priority. Raised by escalation, never lowered.
    pub priority: Priority,
    /// Lifecycle status.
    pub status: ProcessStatus,
    /// Current stage. Meaningful while the process is draft or active.
    pub stage: Stage,
    /// When the current stage was entered. Feeds stage durations in audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_entered_at: Option<DateTime<Utc>>,
    /// Conditional-stage flags, resolved once at start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementFlags>,
    /// When the process was created.
    pub started_at: DateTime<Utc>,
    /// When the process reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock deadline. Set on creation, recomputed only on escalation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Completed-stage ratio, 0–100. Display only, never authoritative.
    pub progress: u8,
    /// Append-only free-text notes (cancellation and failure reasons).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Append-only escalation trail, one timestamped line per escalation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_notes: Vec<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Process {
    /// Create a draft process from an intake record. The caller activates
    /// it and enters the first stage separately so the created/assigned
    /// audit ordering stays observable.
    pub fn new(intake: &BatchIntake, requester: Identity, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id: ProcessId::generate(),
            intake_id: intake.id.clone(),
            material_grade: intake.material_grade.clone(),
            material_size: intake.material_size.clone(),
            requester,
            owner: None,
            priority,
            status: ProcessStatus::Draft,
            stage: Stage::Intake,
            stage_entered_at: None,
            requirements: None,
            started_at: now,
            completed_at: None,
            deadline: None,
            progress: 0,
            notes: Vec::new(),
            escalation_notes: Vec::new(),
            updated_at: now,
        }
    }

    // ── Lifecycle mutators ───────────────────────────────────────────

    /// Activate a draft process.
    pub fn activate(&mut self, at: DateTime<Utc>) {
        self.status = ProcessStatus::Active;
        self.updated_at = at;
    }

    /// Enter a stage: set stage, owner and the stage-entry timestamp.
    pub fn enter_stage(&mut self, stage: Stage, owner: Identity, at: DateTime<Utc>) {
        self.stage = stage;
        self.owner = Some(owner);
        self.stage_entered_at = Some(at);
        self.updated_at = at;
    }

    /// Record the once-only requirement resolution.
    pub fn record_requirements(&mut self, flags: RequirementFlags, at: DateTime<Utc>) {
        self.requirements = Some(flags);
        self.updated_at = at;
    }

    /// Raise priority and move the deadline, leaving an escalation note.
    pub fn escalate_to(
        &mut self,
        priority: Priority,
        deadline: DateTime<Utc>,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.priority = priority;
        self.deadline = Some(deadline);
        self.escalation_notes
            .push(format!("[{}] {}", at.to_rfc3339(), note.into()));
        self.updated_at = at;
    }

    /// Finish successfully: clear the owner, pin progress to 100.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = ProcessStatus::Completed;
        self.completed_at = Some(at);
        self.owner = None;
        self.progress = 100;
        self.updated_at = at;
    }

    /// Cancel before completion.
    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = ProcessStatus::Cancelled;
        self.completed_at = Some(at);
        self.notes.push(format!("cancelled: {}", reason.into()));
        self.updated_at = at;
    }

    /// Stop on an unrecoverable failure.
    pub fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = ProcessStatus::Error;
        self.completed_at = Some(at);
        self.notes.push(format!("failed: {}", reason.into()));
        self.updated_at = at;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.status == ProcessStatus::Active
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time left before the deadline, if one is set. Negative once overdue.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline.map(|deadline| deadline - now)
    }

    /// Classify deadline health at `now`. `None` while no deadline is set.
    ///
    /// The ratio compares remaining time to the whole window
    /// (`deadline - started_at`), so an escalation that moves the deadline
    /// out also widens the window it is judged against.
    pub fn sla_status(&self, now: DateTime<Utc>) -> Option<SlaStatus> {
        let deadline = self.deadline?;
        let remaining = (deadline - now).num_seconds();
        if remaining <= 0 {
            return Some(SlaStatus::Overdue);
        }
        let total = (deadline - self.started_at).num_seconds();
        if total <= 0 {
            return Some(SlaStatus::Overdue);
        }
        let ratio = remaining as f64 / total as f64;
        Some(if ratio <= 0.2 {
            SlaStatus::Critical
        } else if ratio <= 0.5 {
            SlaStatus::Warning
        } else {
            SlaStatus::Ok
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::BatchIntakeId;

    fn make_process() -> Process {
        let intake = BatchIntake::new(BatchIntakeId::new("receipt-1"), "09Г2С", "⌀50");
        Process::new(&intake, Identity::new("requester-1"), Priority::Normal)
    }

    #[test]
    fn priority_ladder_stops_at_urgent() {
        assert_eq!(Priority::Low.escalated(), Priority::Normal);
        assert_eq!(Priority::Normal.escalated(), Priority::High);
        assert_eq!(Priority::High.escalated(), Priority::Urgent);
        assert_eq!(Priority::Urgent.escalated(), Priority::Urgent);
    }

    #[test]
    fn priority_ordering_matches_ladder() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn new_process_is_draft_at_intake() {
        let process = make_process();
        assert_eq!(process.status, ProcessStatus::Draft);
        assert_eq!(process.stage, Stage::Intake);
        assert!(process.owner.is_none());
        assert!(process.deadline.is_none());
        assert!(process.requirements.is_none());
        assert_eq!(process.progress, 0);
    }

    #[test]
    fn lifecycle_terminal_checks() {
        assert!(!ProcessStatus::Draft.is_terminal());
        assert!(!ProcessStatus::Active.is_terminal());
        assert!(ProcessStatus::Completed.is_terminal());
        assert!(ProcessStatus::Cancelled.is_terminal());
        assert!(ProcessStatus::Error.is_terminal());
    }

    #[test]
    fn complete_clears_owner_and_pins_progress() {
        let mut process = make_process();
        let now = Utc::now();
        process.activate(now);
        process.enter_stage(Stage::Approval, Identity::new("supervisor-1"), now);
        process.complete(now);

        assert!(process.is_terminal());
        assert!(process.owner.is_none());
        assert_eq!(process.progress, 100);
        assert_eq!(process.completed_at, Some(now));
    }

    #[test]
    fn escalation_appends_note_and_moves_deadline() {
        let mut process = make_process();
        let now = Utc::now();
        let new_deadline = now + Duration::hours(24);
        process.escalate_to(Priority::High, new_deadline, "SLA critical", now);

        assert_eq!(process.priority, Priority::High);
        assert_eq!(process.deadline, Some(new_deadline));
        assert_eq!(process.escalation_notes.len(), 1);
        assert!(process.escalation_notes[0].contains("SLA critical"));
    }

    #[test]
    fn sla_status_thresholds() {
        let mut process = make_process();
        let start = process.started_at;
        process.deadline = Some(start + Duration::hours(100));

        // 90 of 100 hours left.
        assert_eq!(
            process.sla_status(start + Duration::hours(10)),
            Some(SlaStatus::Ok)
        );
        // Exactly half left.
        assert_eq!(
            process.sla_status(start + Duration::hours(50)),
            Some(SlaStatus::Warning)
        );
        // A tenth left.
        assert_eq!(
            process.sla_status(start + Duration::hours(90)),
            Some(SlaStatus::Critical)
        );
        // Past the deadline.
        assert_eq!(
            process.sla_status(start + Duration::hours(101)),
            Some(SlaStatus::Overdue)
        );
    }

    #[test]
    fn sla_status_none_without_deadline() {
        let process = make_process();
        assert_eq!(process.sla_status(Utc::now()), None);
    }

    #[test]
    fn stage_roles_cover_topology() {
        use crate::identity::RoleTag;
        assert_eq!(Stage::Intake.responsible_role(), RoleTag::Warehouse);
        assert_eq!(Stage::QcInspection.responsible_role(), RoleTag::Quality);
        assert_eq!(
            Stage::ChemicalTesting.responsible_role(),
            RoleTag::Laboratory
        );
        assert_eq!(
            Stage::NondestructiveTesting.responsible_role(),
            RoleTag::Laboratory
        );
        assert_eq!(Stage::ProductionPrep.responsible_role(), RoleTag::Production);
        assert_eq!(Stage::Approval.responsible_role(), RoleTag::Supervision);
    }

    #[test]
    fn requirement_flags_count_conditionals() {
        assert_eq!(RequirementFlags::none().conditional_count(), 0);
        let both = RequirementFlags {
            extended_chemical: true,
            nondestructive: true,
        };
        assert_eq!(both.conditional_count(), 2);
    }
}
