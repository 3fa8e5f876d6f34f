//! Test stores for interleavings the in-memory store cannot produce on
//! its own.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use millgate_storage::{
    AuditStore, InMemoryPipelineStore, ProcessStore, QueryWindow, StorageResult, ViolationStore,
};
use millgate_types::{
    AuditAppend, AuditEntry, Identity, Priority, Process, ProcessId, RequirementFlags, Stage,
    Violation, ViolationId, ViolationSeverity,
};

/// Which guarded call a competing terminal transition lands inside of.
#[derive(Clone, Copy)]
pub(crate) enum Interleave {
    /// Cancel the record just before its first stage advance.
    CancelBeforeAdvance,
    /// Complete the record right after its first open-violation lookup.
    CompleteAfterViolationLookup,
}

/// Store wrapper that fires one competing terminal transition inside a
/// chosen window, reproducing races the callers' pre-checks cannot see.
pub(crate) struct RacingStore {
    inner: InMemoryPipelineStore,
    interleave: Interleave,
    tripped: AtomicBool,
}

impl RacingStore {
    pub(crate) fn new(interleave: Interleave) -> Self {
        Self {
            inner: InMemoryPipelineStore::new(),
            interleave,
            tripped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProcessStore for RacingStore {
    async fn create_process(&self, process: Process) -> StorageResult<()> {
        self.inner.create_process(process).await
    }

    async fn record_requirements(
        &self,
        process_id: &ProcessId,
        flags: RequirementFlags,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.record_requirements(process_id, flags, at).await
    }

    async fn activate_process(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner
            .activate_process(process_id, owner, deadline, at)
            .await
    }

    async fn advance_stage(
        &self,
        process_id: &ProcessId,
        expected_from: Stage,
        to: Stage,
        owner: Identity,
        progress: u8,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        if matches!(self.interleave, Interleave::CancelBeforeAdvance)
            && !self.tripped.swap(true, Ordering::SeqCst)
        {
            self.inner
                .cancel_process(process_id, "batch withdrawn", at)
                .await?;
        }
        self.inner
            .advance_stage(process_id, expected_from, to, owner, progress, at)
            .await
    }

    async fn set_owner(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner.set_owner(process_id, owner, at).await
    }

    async fn record_escalation(
        &self,
        process_id: &ProcessId,
        priority: Priority,
        deadline: DateTime<Utc>,
        note: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner
            .record_escalation(process_id, priority, deadline, note, at)
            .await
    }

    async fn complete_process(
        &self,
        process_id: &ProcessId,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner.complete_process(process_id, at).await
    }

    async fn cancel_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner.cancel_process(process_id, reason, at).await
    }

    async fn fail_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        self.inner.fail_process(process_id, reason, at).await
    }

    async fn get_process(&self, process_id: &ProcessId) -> StorageResult<Option<Process>> {
        self.inner.get_process(process_id).await
    }

    async fn list_processes(&self, window: QueryWindow) -> StorageResult<Vec<Process>> {
        self.inner.list_processes(window).await
    }

    async fn active_with_deadline(&self) -> StorageResult<Vec<Process>> {
        self.inner.active_with_deadline().await
    }
}

#[async_trait]
impl ViolationStore for RacingStore {
    async fn create_violation(&self, violation: Violation) -> StorageResult<()> {
        self.inner.create_violation(violation).await
    }

    async fn get_violation(
        &self,
        violation_id: &ViolationId,
    ) -> StorageResult<Option<Violation>> {
        self.inner.get_violation(violation_id).await
    }

    async fn open_violation_for(
        &self,
        process_id: &ProcessId,
    ) -> StorageResult<Option<Violation>> {
        let open = self.inner.open_violation_for(process_id).await?;
        if matches!(self.interleave, Interleave::CompleteAfterViolationLookup)
            && !self.tripped.swap(true, Ordering::SeqCst)
        {
            self.inner.complete_process(process_id, Utc::now()).await?;
        }
        Ok(open)
    }

    async fn upgrade_violation(
        &self,
        violation_id: &ViolationId,
        severity: ViolationSeverity,
        message: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        self.inner
            .upgrade_violation(violation_id, severity, message, at)
            .await
    }

    async fn acknowledge_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        self.inner
            .acknowledge_violation(violation_id, by, comment, at)
            .await
    }

    async fn resolve_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        self.inner
            .resolve_violation(violation_id, by, comment, at)
            .await
    }

    async fn resolve_open_for(
        &self,
        process_id: &ProcessId,
        by: &Identity,
        comment: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<usize> {
        self.inner
            .resolve_open_for(process_id, by, comment, at)
            .await
    }

    async fn list_violations(&self, window: QueryWindow) -> StorageResult<Vec<Violation>> {
        self.inner.list_violations(window).await
    }

    async fn list_violations_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Violation>> {
        self.inner.list_violations_for(process_id, window).await
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        self.inner.purge_resolved_before(cutoff).await
    }
}

#[async_trait]
impl AuditStore for RacingStore {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEntry> {
        self.inner.append_audit(event).await
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEntry>> {
        self.inner.list_audit(window).await
    }

    async fn list_audit_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditEntry>> {
        self.inner.list_audit_for(process_id, window).await
    }

    async fn latest_audit_hash(&self) -> StorageResult<Option<String>> {
        self.inner.latest_audit_hash().await
    }
}
