//! In-memory reference implementation for the pipeline storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use a transactional backend (e.g. PostgreSQL) for source-of-truth
//! data.

use crate::traits::{AuditStore, ProcessStore, QueryWindow, ViolationStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millgate_types::{
    AuditAppend, AuditEntry, Identity, Priority, Process, ProcessId, ProcessStatus,
    RequirementFlags, Stage, Violation, ViolationId, ViolationSeverity, ViolationState,
};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory pipeline storage adapter.
#[derive(Default)]
pub struct InMemoryPipelineStore {
    processes: RwLock<HashMap<ProcessId, Process>>,
    violations: RwLock<HashMap<ViolationId, Violation>>,
    audits: RwLock<Vec<AuditEntry>>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryPipelineStore {
    async fn create_process(&self, process: Process) -> StorageResult<()> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;

        if guard.contains_key(&process.id) {
            return Err(StorageError::Conflict(format!(
                "process {} already exists",
                process.id
            )));
        }

        guard.insert(process.id.clone(), process);
        Ok(())
    }

    async fn record_requirements(
        &self,
        process_id: &ProcessId,
        flags: RequirementFlags,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = guard
            .get_mut(process_id)
            .ok_or_else(|| StorageError::NotFound(format!("process {} not found", process_id)))?;

        if record.requirements.is_some() {
            return Err(StorageError::InvariantViolation(format!(
                "requirements already recorded for process {}",
                process_id
            )));
        }

        record.record_requirements(flags, at);
        Ok(())
    }

    async fn activate_process(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = guard
            .get_mut(process_id)
            .ok_or_else(|| StorageError::NotFound(format!("process {} not found", process_id)))?;

        if record.status != ProcessStatus::Draft {
            return Err(StorageError::Conflict(format!(
                "process {} is {}, expected draft",
                process_id, record.status
            )));
        }

        record.activate(at);
        let entry_stage = record.stage;
        record.enter_stage(entry_stage, owner, at);
        record.deadline = Some(deadline);
        Ok(record.clone())
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
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = active_record(&mut guard, process_id)?;

        if record.stage != expected_from {
            return Err(StorageError::Conflict(format!(
                "invalid stage transition for process {}: expected {}, found {}",
                process_id, expected_from, record.stage
            )));
        }

        record.enter_stage(to, owner, at);
        record.progress = progress;
        Ok(record.clone())
    }

    async fn set_owner(
        &self,
        process_id: &ProcessId,
        owner: Identity,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = active_record(&mut guard, process_id)?;
        record.owner = Some(owner);
        record.updated_at = at;
        Ok(record.clone())
    }

    async fn record_escalation(
        &self,
        process_id: &ProcessId,
        priority: Priority,
        deadline: DateTime<Utc>,
        note: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = active_record(&mut guard, process_id)?;
        record.escalate_to(priority, deadline, note, at);
        Ok(record.clone())
    }

    async fn complete_process(
        &self,
        process_id: &ProcessId,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = active_record(&mut guard, process_id)?;
        record.complete(at);
        Ok(record.clone())
    }

    async fn cancel_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = non_terminal_record(&mut guard, process_id)?;
        record.cancel(reason, at);
        Ok(record.clone())
    }

    async fn fail_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Process> {
        let mut guard = self
            .processes
            .write()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let record = non_terminal_record(&mut guard, process_id)?;
        record.fail(reason, at);
        Ok(record.clone())
    }

    async fn get_process(&self, process_id: &ProcessId) -> StorageResult<Option<Process>> {
        let guard = self
            .processes
            .read()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        Ok(guard.get(process_id).cloned())
    }

    async fn list_processes(&self, window: QueryWindow) -> StorageResult<Vec<Process>> {
        let guard = self
            .processes
            .read()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn active_with_deadline(&self) -> StorageResult<Vec<Process>> {
        let guard = self
            .processes
            .read()
            .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|record| record.is_active() && record.deadline.is_some())
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|record| record.deadline);
        Ok(values)
    }
}

fn active_record<'a>(
    processes: &'a mut HashMap<ProcessId, Process>,
    process_id: &ProcessId,
) -> StorageResult<&'a mut Process> {
    let record = processes
        .get_mut(process_id)
        .ok_or_else(|| StorageError::NotFound(format!("process {} not found", process_id)))?;

    if record.status != ProcessStatus::Active {
        return Err(StorageError::Conflict(format!(
            "process {} is {}, expected active",
            process_id, record.status
        )));
    }
    Ok(record)
}

/// Cancellation and failure close a process from either draft or active.
fn non_terminal_record<'a>(
    processes: &'a mut HashMap<ProcessId, Process>,
    process_id: &ProcessId,
) -> StorageResult<&'a mut Process> {
    let record = processes
        .get_mut(process_id)
        .ok_or_else(|| StorageError::NotFound(format!("process {} not found", process_id)))?;

    if record.is_terminal() {
        return Err(StorageError::Conflict(format!(
            "process {} is already {}",
            process_id, record.status
        )));
    }
    Ok(record)
}

#[async_trait]
impl ViolationStore for InMemoryPipelineStore {
    async fn create_violation(&self, violation: Violation) -> StorageResult<()> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;

        if guard.contains_key(&violation.id) {
            return Err(StorageError::Conflict(format!(
                "violation {} already exists",
                violation.id
            )));
        }
        if guard
            .values()
            .any(|existing| existing.process_id == violation.process_id && existing.is_open())
        {
            return Err(StorageError::InvariantViolation(format!(
                "process {} already has an open violation",
                violation.process_id
            )));
        }
        // Terminal transitions resolve their open violations on the way
        // out; a write landing afterwards lost that race and must not
        // strand an open record on a closed process. Lock order is
        // violations before processes, here and in upgrade_violation only.
        {
            let processes = self
                .processes
                .read()
                .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
            if let Some(process) = processes.get(&violation.process_id) {
                if process.is_terminal() {
                    return Err(StorageError::Conflict(format!(
                        "process {} is already {}",
                        violation.process_id, process.status
                    )));
                }
            }
        }

        guard.insert(violation.id.clone(), violation);
        Ok(())
    }

    async fn get_violation(&self, violation_id: &ViolationId) -> StorageResult<Option<Violation>> {
        let guard = self
            .violations
            .read()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        Ok(guard.get(violation_id).cloned())
    }

    async fn open_violation_for(
        &self,
        process_id: &ProcessId,
    ) -> StorageResult<Option<Violation>> {
        let guard = self
            .violations
            .read()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .find(|violation| &violation.process_id == process_id && violation.is_open())
            .cloned())
    }

    async fn upgrade_violation(
        &self,
        violation_id: &ViolationId,
        severity: ViolationSeverity,
        message: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        let record = guard.get_mut(violation_id).ok_or_else(|| {
            StorageError::NotFound(format!("violation {} not found", violation_id))
        })?;

        if !record.is_open() {
            return Err(StorageError::Conflict(format!(
                "violation {} is already resolved",
                violation_id
            )));
        }
        {
            let processes = self
                .processes
                .read()
                .map_err(|_| StorageError::Backend("process lock poisoned".to_string()))?;
            if let Some(process) = processes.get(&record.process_id) {
                if process.is_terminal() {
                    return Err(StorageError::Conflict(format!(
                        "process {} is already {}",
                        record.process_id, process.status
                    )));
                }
            }
        }

        record.upgrade(severity, message, at);
        Ok(record.clone())
    }

    async fn acknowledge_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        let record = guard.get_mut(violation_id).ok_or_else(|| {
            StorageError::NotFound(format!("violation {} not found", violation_id))
        })?;

        if !record.is_active() {
            return Err(StorageError::Conflict(format!(
                "violation {} is not active",
                violation_id
            )));
        }

        record.acknowledge(by, comment, at);
        Ok(record.clone())
    }

    async fn resolve_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> StorageResult<Violation> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        let record = guard.get_mut(violation_id).ok_or_else(|| {
            StorageError::NotFound(format!("violation {} not found", violation_id))
        })?;

        if !record.is_open() {
            return Err(StorageError::Conflict(format!(
                "violation {} is already resolved",
                violation_id
            )));
        }

        record.resolve(by, comment, at);
        Ok(record.clone())
    }

    async fn resolve_open_for(
        &self,
        process_id: &ProcessId,
        by: &Identity,
        comment: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;

        let mut closed = 0;
        for record in guard.values_mut() {
            if &record.process_id == process_id && record.is_open() {
                record.resolve(by.clone(), Some(comment.to_string()), at);
                closed += 1;
            }
        }
        Ok(closed)
    }

    async fn list_violations(&self, window: QueryWindow) -> StorageResult<Vec<Violation>> {
        let guard = self
            .violations
            .read()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn list_violations_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Violation>> {
        let guard = self
            .violations
            .read()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|violation| &violation.process_id == process_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let mut guard = self
            .violations
            .write()
            .map_err(|_| StorageError::Backend("violation lock poisoned".to_string()))?;

        let before = guard.len();
        guard.retain(|_, violation| {
            !(violation.state == ViolationState::Resolved
                && violation.resolved_at.map_or(false, |resolved| resolved < cutoff))
        });
        Ok(before - guard.len())
    }
}

#[async_trait]
impl AuditStore for InMemoryPipelineStore {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEntry> {
        let mut guard = self
            .audits
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        let previous_hash = guard.last().map(|e| e.hash.clone());
        let sequence = guard.len() as u64 + 1;
        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditEntry {
            entry_id: format!("audit-{}", Uuid::new_v4()),
            sequence,
            process_id: event.process_id,
            stage: event.stage,
            action: event.action,
            performer: event.performer,
            target: event.target,
            timestamp: event.timestamp,
            comment: event.comment,
            metadata: event.metadata,
            duration_secs: event.duration_secs,
            previous_hash,
            hash,
        };

        guard.push(record.clone());
        Ok(record)
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEntry>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        let mut values = guard.clone();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }

    async fn list_audit_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditEntry>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        let mut values = guard
            .iter()
            .filter(|entry| &entry.process_id == process_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }

    async fn latest_audit_hash(&self) -> StorageResult<Option<String>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        Ok(guard.last().map(|e| e.hash.clone()))
    }
}

fn compute_audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "process_id": event.process_id,
        "stage": event.stage,
        "action": event.action,
        "performer": event.performer,
        "target": event.target,
        "timestamp": event.timestamp,
        "comment": event.comment,
        "metadata": event.metadata,
        "duration_secs": event.duration_secs,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use millgate_types::{ActionKind, BatchIntake, BatchIntakeId};

    fn make_process() -> Process {
        let intake = BatchIntake::new(BatchIntakeId::new("receipt-77"), "12X18H10T", "⌀150");
        Process::new(&intake, Identity::new("requester-1"), Priority::Normal)
    }

    async fn seed_active(store: &InMemoryPipelineStore) -> Process {
        let process = make_process();
        store.create_process(process.clone()).await.unwrap();
        store
            .activate_process(
                &process.id,
                Identity::new("warehouse-1"),
                Utc::now() + Duration::hours(96),
                Utc::now(),
            )
            .await
            .unwrap()
    }

    fn make_append(process_id: &ProcessId, action: ActionKind) -> AuditAppend {
        AuditAppend::new(
            process_id.clone(),
            Stage::Intake,
            action,
            Identity::new("system"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn create_process_rejects_duplicate() {
        let store = InMemoryPipelineStore::new();
        let process = make_process();
        store.create_process(process.clone()).await.unwrap();

        let result = store.create_process(process).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn requirements_are_write_once() {
        let store = InMemoryPipelineStore::new();
        let process = make_process();
        store.create_process(process.clone()).await.unwrap();

        let flags = RequirementFlags {
            extended_chemical: true,
            nondestructive: true,
        };
        store
            .record_requirements(&process.id, flags, Utc::now())
            .await
            .unwrap();

        let result = store
            .record_requirements(&process.id, RequirementFlags::none(), Utc::now())
            .await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));

        let stored = store.get_process(&process.id).await.unwrap().unwrap();
        assert_eq!(stored.requirements, Some(flags));
    }

    #[tokio::test]
    async fn activation_requires_draft() {
        let store = InMemoryPipelineStore::new();
        let process = seed_active(&store).await;
        assert_eq!(process.status, ProcessStatus::Active);
        assert!(process.deadline.is_some());

        let result = store
            .activate_process(
                &process.id,
                Identity::new("warehouse-2"),
                Utc::now() + Duration::hours(1),
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn advance_stage_checks_expected_stage() {
        let store = InMemoryPipelineStore::new();
        let process = seed_active(&store).await;

        let stale = store
            .advance_stage(
                &process.id,
                Stage::QcInspection,
                Stage::ChemicalTesting,
                Identity::new("lab-1"),
                33,
                Utc::now(),
            )
            .await;
        assert!(matches!(stale, Err(StorageError::Conflict(_))));

        let advanced = store
            .advance_stage(
                &process.id,
                Stage::Intake,
                Stage::QcInspection,
                Identity::new("inspector-1"),
                16,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(advanced.stage, Stage::QcInspection);
        assert_eq!(advanced.owner, Some(Identity::new("inspector-1")));
        assert_eq!(advanced.progress, 16);
    }

    #[tokio::test]
    async fn draft_process_can_be_cancelled() {
        let store = InMemoryPipelineStore::new();
        let process = make_process();
        store.create_process(process.clone()).await.unwrap();

        let cancelled = store
            .cancel_process(&process.id, "duplicate intake record", Utc::now())
            .await
            .unwrap();
        assert_eq!(cancelled.status, ProcessStatus::Cancelled);
        assert!(cancelled.notes[0].contains("duplicate intake record"));
    }

    #[tokio::test]
    async fn terminal_process_rejects_mutation() {
        let store = InMemoryPipelineStore::new();
        let process = seed_active(&store).await;
        store.complete_process(&process.id, Utc::now()).await.unwrap();

        let cancel = store.cancel_process(&process.id, "late", Utc::now()).await;
        assert!(matches!(cancel, Err(StorageError::Conflict(_))));

        let advance = store
            .advance_stage(
                &process.id,
                Stage::Intake,
                Stage::QcInspection,
                Identity::new("inspector-1"),
                16,
                Utc::now(),
            )
            .await;
        assert!(matches!(advance, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn one_open_violation_per_process() {
        let store = InMemoryPipelineStore::new();
        let process_id = ProcessId::generate();
        let first = Violation::new(
            process_id.clone(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        );
        store.create_violation(first).await.unwrap();

        let second = Violation::new(
            process_id,
            ViolationSeverity::Critical,
            "a fifth left",
            Utc::now(),
        );
        let result = store.create_violation(second).await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn terminal_processes_accept_no_violation_writes() {
        let store = InMemoryPipelineStore::new();
        let process = seed_active(&store).await;
        store.complete_process(&process.id, Utc::now()).await.unwrap();

        // A sweep that read the process as active before it completed
        // must not strand an open violation on the closed record.
        let late = store
            .create_violation(Violation::new(
                process.id.clone(),
                ViolationSeverity::Overdue,
                "deadline passed",
                Utc::now(),
            ))
            .await;
        assert!(matches!(late, Err(StorageError::Conflict(_))));
        assert!(store
            .open_violation_for(&process.id)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .list_violations_for(&process.id, QueryWindow::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn violation_upgrades_stop_once_the_process_closes() {
        let store = InMemoryPipelineStore::new();
        let process = seed_active(&store).await;
        let violation = Violation::new(
            process.id.clone(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        );
        let violation_id = violation.id.clone();
        store.create_violation(violation).await.unwrap();
        store
            .cancel_process(&process.id, "batch rejected at the gate", Utc::now())
            .await
            .unwrap();

        let result = store
            .upgrade_violation(
                &violation_id,
                ViolationSeverity::Overdue,
                "deadline passed",
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        let stored = store.get_violation(&violation_id).await.unwrap().unwrap();
        assert_eq!(stored.severity, ViolationSeverity::Warning);
    }

    #[tokio::test]
    async fn resolve_open_for_closes_acknowledged_violations_too() {
        let store = InMemoryPipelineStore::new();
        let process_id = ProcessId::generate();

        let violation = Violation::new(
            process_id.clone(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        );
        let violation_id = violation.id.clone();
        store.create_violation(violation).await.unwrap();
        store
            .acknowledge_violation(&violation_id, Identity::new("supervisor-1"), None, Utc::now())
            .await
            .unwrap();

        let closed = store
            .resolve_open_for(
                &process_id,
                &Identity::new("system"),
                "process reached a terminal status",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(closed, 1);
        assert!(store
            .open_violation_for(&process_id)
            .await
            .unwrap()
            .is_none());

        let stored = store.get_violation(&violation_id).await.unwrap().unwrap();
        assert_eq!(stored.state, ViolationState::Resolved);
        assert_eq!(stored.resolved_by, Some(Identity::new("system")));
    }

    #[tokio::test]
    async fn acknowledged_violations_stay_open_for_lookup_and_upgrade() {
        let store = InMemoryPipelineStore::new();
        let process_id = ProcessId::generate();
        let violation = Violation::new(
            process_id.clone(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        );
        let violation_id = violation.id.clone();
        store.create_violation(violation).await.unwrap();
        store
            .acknowledge_violation(&violation_id, Identity::new("supervisor-1"), None, Utc::now())
            .await
            .unwrap();

        let open = store.open_violation_for(&process_id).await.unwrap().unwrap();
        assert_eq!(open.id, violation_id);

        let upgraded = store
            .upgrade_violation(
                &violation_id,
                ViolationSeverity::Overdue,
                "deadline passed",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(upgraded.severity, ViolationSeverity::Overdue);
        assert_eq!(upgraded.state, ViolationState::Acknowledged);
    }

    #[tokio::test]
    async fn upgrade_requires_open_state() {
        let store = InMemoryPipelineStore::new();
        let violation = Violation::new(
            ProcessId::generate(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            Utc::now(),
        );
        let id = violation.id.clone();
        store.create_violation(violation).await.unwrap();
        store
            .resolve_violation(&id, Identity::new("supervisor-1"), None, Utc::now())
            .await
            .unwrap();

        let result = store
            .upgrade_violation(&id, ViolationSeverity::Overdue, "deadline passed", Utc::now())
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn purge_drops_only_old_resolved_violations() {
        let store = InMemoryPipelineStore::new();
        let now = Utc::now();

        let old = Violation::new(
            ProcessId::generate(),
            ViolationSeverity::Overdue,
            "deadline passed",
            now - Duration::days(60),
        );
        let old_id = old.id.clone();
        store.create_violation(old).await.unwrap();
        store
            .resolve_violation(
                &old_id,
                Identity::new("system"),
                None,
                now - Duration::days(45),
            )
            .await
            .unwrap();

        let recent = Violation::new(
            ProcessId::generate(),
            ViolationSeverity::Warning,
            "half the budget is gone",
            now - Duration::days(2),
        );
        let recent_id = recent.id.clone();
        store.create_violation(recent).await.unwrap();
        store
            .resolve_violation(&recent_id, Identity::new("system"), None, now - Duration::days(1))
            .await
            .unwrap();

        let open = Violation::new(
            ProcessId::generate(),
            ViolationSeverity::Critical,
            "a fifth left",
            now - Duration::days(90),
        );
        store.create_violation(open).await.unwrap();

        let purged = store
            .purge_resolved_before(now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get_violation(&old_id).await.unwrap().is_none());
        assert!(store.get_violation(&recent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn audit_chain_hashes_are_linked() {
        let store = InMemoryPipelineStore::new();
        let process_id = ProcessId::generate();

        let first = store
            .append_audit(make_append(&process_id, ActionKind::Created))
            .await
            .unwrap();
        let second = store
            .append_audit(make_append(&process_id, ActionKind::Assigned))
            .await
            .unwrap();

        assert_eq!(first.sequence, 1);
        assert!(first.previous_hash.is_none());
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash, Some(first.hash));
    }

    #[tokio::test]
    async fn audit_listing_is_windowed_newest_first() {
        let store = InMemoryPipelineStore::new();
        let process_id = ProcessId::generate();
        let other = ProcessId::generate();

        for action in [ActionKind::Created, ActionKind::Assigned, ActionKind::Started] {
            store
                .append_audit(make_append(&process_id, action))
                .await
                .unwrap();
        }
        store
            .append_audit(make_append(&other, ActionKind::Created))
            .await
            .unwrap();

        let page = store
            .list_audit_for(
                &process_id,
                QueryWindow {
                    limit: 2,
                    offset: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 3);
        assert_eq!(page[1].sequence, 2);

        let all = store.list_audit(QueryWindow::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].sequence, 4);
    }
}
