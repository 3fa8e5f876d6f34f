use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millgate_types::{
    AuditAppend, AuditEntry, Identity, Priority, Process, ProcessId, RequirementFlags, Stage,
    Violation, ViolationId, ViolationSeverity,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for pipeline process records.
///
/// Mutators are targeted and guarded: each enforces the lifecycle
/// invariant it depends on (expected stage, draft-only activation,
/// write-once requirements, active-only updates) so that no caller
/// can drive a record into an inconsistent state. A state precondition
/// that no longer holds rejects with [`Conflict`]; a write that would
/// corrupt stored data rejects with [`InvariantViolation`].
///
/// [`Conflict`]: crate::StorageError::Conflict
/// [`InvariantViolation`]: crate::StorageError::InvariantViolation
#[async_trait]
pub trait ProcessStore: Send + Sync {
    /// Insert a newly drafted process record.
    async fn create_process(&self, process: Process) -> StorageResult<()>;

    /// Record the resolved requirement flags. Write-once per process.
    async fn record_requirements(
        &self,
        process_id: &ProcessId,
        flags: RequirementFlags,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Activate a drafted process: enter its first stage with the given
    /// owner and arm the deadline.
    async fn activate_process(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Move an active process from one stage to the next. Fails unless
    /// the stored stage equals `expected_from`.
    async fn advance_stage(
        &self,
        process_id: &ProcessId,
        expected_from: Stage,
        to: Stage,
        owner: Identity,
        progress: u8,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Replace the owner of an active process.
    async fn set_owner(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Raise priority and re-arm the deadline on an active process.
    async fn record_escalation(
        &self,
        process_id: &ProcessId,
        priority: Priority,
        deadline: DateTime<Utc>,
        note: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Finish an active process successfully.
    async fn complete_process(
        &self,
        process_id: &ProcessId,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Cancel an active process with a reason.
    async fn cancel_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Mark an active process as failed with a reason.
    async fn fail_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process>;

    /// Get one process record by id.
    async fn get_process(&self, process_id: &ProcessId) -> StorageResult<Option<Process>>;

    /// List records newest-first.
    async fn list_processes(&self, window: QueryWindow) -> StorageResult<Vec<Process>>;

    /// All active processes carrying a deadline, earliest deadline first.
    async fn active_with_deadline(&self) -> StorageResult<Vec<Process>>;
}

/// Storage interface for SLA violation records.
///
/// State guards reject with [`Conflict`]; the one-open-violation rule
/// rejects with [`InvariantViolation`].
///
/// [`Conflict`]: crate::StorageError::Conflict
/// [`InvariantViolation`]: crate::StorageError::InvariantViolation
#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// Insert a new violation. At most one open violation may exist per
    /// process at any time, and a terminal process accepts none.
    async fn create_violation(&self, violation: Violation) -> StorageResult<()>;

    /// Get one violation by id.
    async fn get_violation(&self, violation_id: &ViolationId) -> StorageResult<Option<Violation>>;

    /// The open (active or acknowledged) violation for a process, if any.
    async fn open_violation_for(
        &self,
        process_id: &ProcessId,
    ) -> StorageResult<Option<Violation>>;

    /// Raise the severity of an open violation. Rejected once the
    /// owning process is terminal.
    async fn upgrade_violation(
        &self,
        violation_id: &ViolationId,
        severity: ViolationSeverity,
        message: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation>;

    /// Acknowledge an active violation.
    async fn acknowledge_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation>;

    /// Resolve an open (active or acknowledged) violation.
    async fn resolve_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation>;

    /// Resolve every open violation of a process. Returns how many were
    /// closed.
    async fn resolve_open_for(
        &self,
        process_id: &ProcessId,
        by: &Identity,
        comment: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// List violations newest-first.
    async fn list_violations(&self, window: QueryWindow) -> StorageResult<Vec<Violation>>;

    /// List violations of one process, newest-first.
    async fn list_violations_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Violation>>;

    /// Drop resolved violations older than the cutoff. Returns how many
    /// were removed.
    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}

/// Storage interface for append-only audit events.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEntry>;

    /// Read events newest-first.
    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEntry>>;

    /// Read the events of one process, newest-first.
    async fn list_audit_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditEntry>>;

    /// Get the latest audit hash anchor.
    async fn latest_audit_hash(&self) -> StorageResult<Option<String>>;
}

/// Unified storage bundle used by the pipeline coordinator and monitor.
pub trait PipelineStore: ProcessStore + ViolationStore + AuditStore + Send + Sync {}

impl<T> PipelineStore for T where T: ProcessStore + ViolationStore + AuditStore + Send + Sync {}
