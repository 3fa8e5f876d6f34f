//! The inbound operation surface of the pipeline engine.
//!
//! One coordinator instance serves every process concurrently. Each
//! operation validates the incoming signal against the stored record,
//! performs the transition through the store's guarded mutators, appends
//! exactly one audit entry per logical change, and requests notifications
//! from the two designated sites: escalation and pipeline completion.
//! Stage work itself always happens outside; the coordinator only reacts
//! to signals.
//!
//! Per-process serialization of transitions is the store deployment's
//! concern. The coordinator pre-validates every signal and relies on the
//! store's guarded mutators as the backstop; a conflict firing after a
//! successful pre-check is re-read and reported as an invalid transition
//! carrying the record's current stage and owner, while invariant trips
//! surface as [`EngineError::Corruption`]. A record the coordinator can
//! see violating its own lifecycle invariants is closed out as `error`
//! before the corruption is reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use millgate_rules::{deadline_for, resolve};
use millgate_storage::{PipelineStore, QueryWindow, StorageError};
use millgate_types::{
    ActionKind, AuditAppend, AuditEntry, BatchIntake, Identity, Priority, Process, ProcessId,
    Stage, Violation, ViolationId, ViolationSeverity,
};

use crate::assignment::assign;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ports::{NotificationKind, NotificationRequest, Notifier, RoleDirectory};
use crate::state_machine::{next_step, progress_after, NextStep};

/// Identity recorded on system-driven transitions.
pub(crate) const SYSTEM_ACTOR: &str = "system";

/// Coordinates pipeline processes across the store and the outbound ports.
pub struct PipelineCoordinator {
    store: Arc<dyn PipelineStore>,
    directory: Arc<dyn RoleDirectory>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        directory: Arc<dyn RoleDirectory>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            config,
        }
    }

    // ── Inbound operations ───────────────────────────────────────────

    /// Start a new process for a batch intake record.
    ///
    /// Resolves the conditional-stage requirements exactly once, freezes
    /// them on the record, computes the deadline from the start time, and
    /// enters the intake stage with an assigned owner.
    pub async fn start_process(
        &self,
        intake: BatchIntake,
        requester: Identity,
        priority: Priority,
    ) -> EngineResult<Process> {
        let decision = resolve(&intake.material_grade, &intake.material_size);
        let process = Process::new(&intake, requester.clone(), priority);
        let process_id = process.id.clone();
        let created_at = process.started_at;

        self.store.create_process(process).await?;
        self.store
            .append_audit(
                AuditAppend::new(
                    process_id.clone(),
                    Stage::Intake,
                    ActionKind::Created,
                    requester.clone(),
                    created_at,
                )
                .with_metadata(json!({
                    "intake_id": intake.id,
                    "material_grade": intake.material_grade,
                    "material_size": intake.material_size,
                    "supplier": intake.supplier,
                    "batch_number": intake.batch_number,
                    "priority": priority,
                    "requirements": decision.flags,
                    "requirement_reasons": decision.reasons,
                })),
            )
            .await?;
        self.store
            .record_requirements(&process_id, decision.flags, created_at)
            .await?;

        let role = Stage::Intake.responsible_role();
        let assignment = assign(self.directory.as_ref(), role, &requester).await;
        let deadline = deadline_for(created_at, priority, decision.flags);
        let process = match self
            .store
            .activate_process(&process_id, assignment.owner.clone(), deadline, created_at)
            .await
        {
            Ok(process) => process,
            Err(err) => return Err(self.conflict_context(&process_id, err).await),
        };

        self.store
            .append_audit(
                AuditAppend::new(
                    process_id.clone(),
                    Stage::Intake,
                    ActionKind::Assigned,
                    self.system(),
                    created_at,
                )
                .with_target(assignment.owner.clone())
                .with_metadata(assignment.audit_metadata(role)),
            )
            .await?;
        self.store
            .append_audit(AuditAppend::new(
                process_id.clone(),
                Stage::Intake,
                ActionKind::Started,
                assignment.owner.clone(),
                created_at,
            ))
            .await?;

        info!(
            process_id = %process_id,
            intake_id = %process.intake_id,
            owner = %assignment.owner,
            priority = %priority,
            deadline = %deadline,
            "process started"
        );
        Ok(process)
    }

    /// Apply a stage completion signal from a stage handler.
    ///
    /// The signal must name the process's current stage; anything else is
    /// an out-of-order completion and is reported with the stored stage
    /// and owner. Gateways pick the next stage from the frozen flags, so
    /// the process advances or finishes without waiting on anyone.
    pub async fn complete_stage(
        &self,
        process_id: &ProcessId,
        stage: Stage,
        performed_by: Identity,
        comment: Option<String>,
    ) -> EngineResult<Process> {
        let now = Utc::now();
        let process = self.load_process(process_id).await?;

        if !process.is_active() {
            return Err(invalid_transition(
                &process,
                format!("completion signal for a {} process", process.status),
            ));
        }
        if process.stage != stage {
            return Err(invalid_transition(
                &process,
                format!("completion signal names stage {}", stage),
            ));
        }
        let Some(flags) = process.requirements else {
            return Err(self
                .close_corrupt(process_id, "is active without resolved requirements")
                .await);
        };

        // The completed entry is appended only once the guarded store
        // transition holds, still ahead of the next stage's entry
        // actions: the trail keeps causal order and never records an
        // exit the store rejected.
        let mut completed = AuditAppend::new(
            process_id.clone(),
            stage,
            ActionKind::Completed,
            performed_by,
            now,
        );
        if let Some(comment) = comment {
            completed = completed.with_comment(comment);
        }
        if let Some(entered) = process.stage_entered_at {
            completed = completed.with_duration_secs((now - entered).num_seconds());
        }

        match next_step(stage, flags) {
            NextStep::Stage(next) => {
                let role = next.responsible_role();
                let assignment = assign(self.directory.as_ref(), role, &process.requester).await;
                let updated = match self
                    .store
                    .advance_stage(
                        process_id,
                        stage,
                        next,
                        assignment.owner.clone(),
                        progress_after(stage, flags),
                        now,
                    )
                    .await
                {
                    Ok(updated) => updated,
                    Err(err) => return Err(self.conflict_context(process_id, err).await),
                };

                self.store.append_audit(completed).await?;
                self.store
                    .append_audit(
                        AuditAppend::new(
                            process_id.clone(),
                            next,
                            ActionKind::Assigned,
                            self.system(),
                            now,
                        )
                        .with_target(assignment.owner.clone())
                        .with_metadata(assignment.audit_metadata(role)),
                    )
                    .await?;
                self.store
                    .append_audit(AuditAppend::new(
                        process_id.clone(),
                        next,
                        ActionKind::Started,
                        assignment.owner.clone(),
                        now,
                    ))
                    .await?;

                info!(
                    process_id = %process_id,
                    completed = %stage,
                    next = %next,
                    owner = %assignment.owner,
                    "stage completed"
                );
                Ok(updated)
            }
            NextStep::Done => {
                let final_owner = process.owner.clone();
                let updated = match self.store.complete_process(process_id, now).await {
                    Ok(updated) => updated,
                    Err(err) => return Err(self.conflict_context(process_id, err).await),
                };
                self.store.append_audit(completed).await?;
                let closed = self
                    .store
                    .resolve_open_for(
                        process_id,
                        &self.system(),
                        "process reached a terminal status",
                        now,
                    )
                    .await?;
                if closed > 0 {
                    info!(process_id = %process_id, closed, "auto-resolved open violations");
                }

                let mut recipients = vec![updated.requester.clone()];
                if let Some(owner) = final_owner {
                    if !recipients.contains(&owner) {
                        recipients.push(owner);
                    }
                }
                self.notify(NotificationRequest {
                    kind: NotificationKind::Completion,
                    recipients,
                    process_id: process_id.clone(),
                    message: format!(
                        "process {} passed final approval for batch {}",
                        process_id, updated.intake_id
                    ),
                    payload: json!({
                        "process_id": updated.id,
                        "intake_id": updated.intake_id,
                        "material_grade": updated.material_grade,
                        "material_size": updated.material_size,
                        "completed_at": updated.completed_at,
                    }),
                })
                .await;

                info!(process_id = %process_id, "process completed");
                Ok(updated)
            }
        }
    }

    /// Cancel a process. Terminal processes are left untouched.
    pub async fn cancel_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        by: Identity,
    ) -> EngineResult<Process> {
        let now = Utc::now();
        let process = self.load_process(process_id).await?;
        if process.is_terminal() {
            // Cancelling a finished process is a no-op, not an error.
            return Ok(process);
        }

        let updated = match self.store.cancel_process(process_id, reason, now).await {
            Ok(updated) => updated,
            Err(StorageError::Conflict(detail)) => {
                // A terminal transition landing after the pre-check wins;
                // the cancel degrades to the same no-op.
                let current = self.load_process(process_id).await?;
                if current.is_terminal() {
                    return Ok(current);
                }
                return Err(invalid_transition(&current, detail));
            }
            Err(err) => return Err(err.into()),
        };
        self.store
            .append_audit(
                AuditAppend::new(
                    process_id.clone(),
                    updated.stage,
                    ActionKind::Cancelled,
                    by,
                    now,
                )
                .with_comment(reason),
            )
            .await?;
        let closed = self
            .store
            .resolve_open_for(process_id, &self.system(), "process was cancelled", now)
            .await?;
        if closed > 0 {
            info!(process_id = %process_id, closed, "auto-resolved open violations");
        }

        info!(process_id = %process_id, reason, "process cancelled");
        Ok(updated)
    }

    /// Stop a process on an unrecoverable stage failure. Terminal
    /// processes are left untouched.
    pub async fn fail_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        by: Identity,
    ) -> EngineResult<Process> {
        let now = Utc::now();
        let process = self.load_process(process_id).await?;
        if process.is_terminal() {
            return Ok(process);
        }

        let updated = match self.store.fail_process(process_id, reason, now).await {
            Ok(updated) => updated,
            Err(StorageError::Conflict(detail)) => {
                let current = self.load_process(process_id).await?;
                if current.is_terminal() {
                    return Ok(current);
                }
                return Err(invalid_transition(&current, detail));
            }
            Err(err) => return Err(err.into()),
        };
        self.store
            .append_audit(
                AuditAppend::new(
                    process_id.clone(),
                    updated.stage,
                    ActionKind::Failed,
                    by,
                    now,
                )
                .with_comment(reason),
            )
            .await?;
        let closed = self
            .store
            .resolve_open_for(process_id, &self.system(), "process stopped on failure", now)
            .await?;
        if closed > 0 {
            info!(process_id = %process_id, closed, "auto-resolved open violations");
        }

        warn!(process_id = %process_id, reason, "process failed");
        Ok(updated)
    }

    /// Hand the current stage to a different owner.
    pub async fn reassign_process(
        &self,
        process_id: &ProcessId,
        new_owner: Identity,
        by: Identity,
        comment: Option<String>,
    ) -> EngineResult<Process> {
        let now = Utc::now();
        let process = self.load_process(process_id).await?;
        if !process.is_active() {
            return Err(invalid_transition(
                &process,
                format!("reassignment of a {} process", process.status),
            ));
        }

        let previous_owner = process.owner.clone();
        let updated = match self
            .store
            .set_owner(process_id, new_owner.clone(), now)
            .await
        {
            Ok(updated) => updated,
            Err(err) => return Err(self.conflict_context(process_id, err).await),
        };
        let mut entry = AuditAppend::new(
            process_id.clone(),
            updated.stage,
            ActionKind::Reassigned,
            by,
            now,
        )
        .with_target(new_owner.clone())
        .with_metadata(json!({ "previous_owner": previous_owner }));
        if let Some(comment) = comment {
            entry = entry.with_comment(comment);
        }
        self.store.append_audit(entry).await?;

        info!(process_id = %process_id, owner = %new_owner, "stage reassigned");
        Ok(updated)
    }

    /// Escalate a process by hand: one priority step up the ladder, a
    /// recomputed deadline, and a notification to the owner plus the
    /// supervisory role. Ensures an open violation exists so every
    /// escalation stays tied to a violation record.
    ///
    /// Terminal processes are left untouched; completion wins over any
    /// racing escalation signal.
    pub async fn escalate_process(
        &self,
        process_id: &ProcessId,
        reason: &str,
        by: Identity,
    ) -> EngineResult<Process> {
        let now = Utc::now();
        let process = self.load_process(process_id).await?;
        if process.is_terminal() {
            return Ok(process);
        }
        if !process.is_active() {
            return Err(invalid_transition(
                &process,
                format!("escalation of a {} process", process.status),
            ));
        }

        if self
            .store
            .open_violation_for(process_id)
            .await?
            .is_none()
        {
            let violation = Violation::new(
                process_id.clone(),
                ViolationSeverity::Warning,
                format!("manually escalated: {}", reason),
                now,
            );
            match self.store.create_violation(violation).await {
                Ok(()) => {}
                Err(StorageError::Conflict(detail)) => {
                    // The store rejects violation writes once the
                    // process is terminal; the completion that won the
                    // race stands.
                    let current = self.load_process(process_id).await?;
                    if current.is_terminal() {
                        return Ok(current);
                    }
                    return Err(invalid_transition(&current, detail));
                }
                Err(StorageError::InvariantViolation(_)) => {
                    // Another writer opened the violation first; the
                    // escalation rides on that record.
                }
                Err(err) => return Err(err.into()),
            }
        }

        match self.apply_escalation(&process, reason, &by, now).await {
            Err(err @ EngineError::InvalidTransition { .. }) => {
                let current = self.load_process(process_id).await?;
                if current.is_terminal() {
                    Ok(current)
                } else {
                    Err(err)
                }
            }
            other => other,
        }
    }

    /// Acknowledge an active violation without closing it.
    pub async fn acknowledge_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
    ) -> EngineResult<Violation> {
        let violation = self.load_violation(violation_id).await?;
        if !violation.is_active() {
            let process = self.load_process(&violation.process_id).await?;
            return Err(invalid_transition(
                &process,
                format!("violation {} is not active", violation_id),
            ));
        }

        let updated = match self
            .store
            .acknowledge_violation(violation_id, by, comment, Utc::now())
            .await
        {
            Ok(updated) => updated,
            Err(StorageError::Conflict(detail)) => {
                let process = self.load_process(&violation.process_id).await?;
                return Err(invalid_transition(&process, detail));
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            violation_id = %violation_id,
            process_id = %updated.process_id,
            "violation acknowledged"
        );
        Ok(updated)
    }

    /// Close an open violation with an optional comment.
    pub async fn resolve_violation(
        &self,
        violation_id: &ViolationId,
        by: Identity,
        comment: Option<String>,
    ) -> EngineResult<Violation> {
        let violation = self.load_violation(violation_id).await?;
        if !violation.is_open() {
            let process = self.load_process(&violation.process_id).await?;
            return Err(invalid_transition(
                &process,
                format!("violation {} is already resolved", violation_id),
            ));
        }

        let updated = match self
            .store
            .resolve_violation(violation_id, by, comment, Utc::now())
            .await
        {
            Ok(updated) => updated,
            Err(StorageError::Conflict(detail)) => {
                let process = self.load_process(&violation.process_id).await?;
                return Err(invalid_transition(&process, detail));
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            violation_id = %violation_id,
            process_id = %updated.process_id,
            "violation resolved"
        );
        Ok(updated)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch one process.
    pub async fn get_process(&self, process_id: &ProcessId) -> EngineResult<Process> {
        self.load_process(process_id).await
    }

    /// List processes, newest first.
    pub async fn list_processes(&self, window: QueryWindow) -> EngineResult<Vec<Process>> {
        Ok(self.store.list_processes(window).await?)
    }

    /// The audit trail of one process, newest first.
    pub async fn process_history(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> EngineResult<Vec<AuditEntry>> {
        self.load_process(process_id).await?;
        Ok(self.store.list_audit_for(process_id, window).await?)
    }

    /// The violations of one process, newest first.
    pub async fn violations_for(
        &self,
        process_id: &ProcessId,
        window: QueryWindow,
    ) -> EngineResult<Vec<Violation>> {
        self.load_process(process_id).await?;
        Ok(self.store.list_violations_for(process_id, window).await?)
    }

    // ── Escalation core ──────────────────────────────────────────────

    /// Shared escalation path for manual requests and sweep triggers.
    /// The caller has already verified the process is active.
    pub(crate) async fn apply_escalation(
        &self,
        process: &Process,
        reason: &str,
        by: &Identity,
        now: DateTime<Utc>,
    ) -> EngineResult<Process> {
        let Some(flags) = process.requirements else {
            return Err(self
                .close_corrupt(&process.id, "is active without resolved requirements")
                .await);
        };
        let from_priority = process.priority;
        let to_priority = from_priority.escalated();
        let deadline = deadline_for(now, to_priority, flags);

        let updated = match self
            .store
            .record_escalation(&process.id, to_priority, deadline, reason, now)
            .await
        {
            Ok(updated) => updated,
            Err(err) => return Err(self.conflict_context(&process.id, err).await),
        };
        self.store
            .append_audit(
                AuditAppend::new(
                    process.id.clone(),
                    updated.stage,
                    ActionKind::Escalated,
                    by.clone(),
                    now,
                )
                .with_comment(reason)
                .with_metadata(json!({
                    "from_priority": from_priority,
                    "to_priority": to_priority,
                    "deadline": deadline,
                })),
            )
            .await?;

        let mut recipients = Vec::new();
        if let Some(owner) = updated.owner.clone() {
            recipients.push(owner);
        }
        match self
            .directory
            .active_members(self.config.supervisor_role)
            .await
        {
            Ok(members) => {
                for member in members {
                    if !recipients.contains(&member) {
                        recipients.push(member);
                    }
                }
            }
            Err(err) => {
                warn!(
                    process_id = %process.id,
                    role = %self.config.supervisor_role,
                    error = %err,
                    "supervisory role lookup failed, notifying owner only"
                );
            }
        }
        if recipients.is_empty() {
            warn!(process_id = %process.id, "escalation has no reachable recipients");
        } else {
            self.notify(NotificationRequest {
                kind: NotificationKind::Escalation,
                recipients,
                process_id: process.id.clone(),
                message: format!(
                    "process {} escalated to {} priority: {}",
                    process.id, to_priority, reason
                ),
                payload: json!({
                    "process_id": updated.id,
                    "stage": updated.stage,
                    "priority": to_priority,
                    "deadline": deadline,
                    "reason": reason,
                }),
            })
            .await;
        }

        info!(
            process_id = %process.id,
            from = %from_priority,
            to = %to_priority,
            deadline = %deadline,
            "process escalated"
        );
        Ok(updated)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn load_process(&self, process_id: &ProcessId) -> EngineResult<Process> {
        self.store
            .get_process(process_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("process {} not found", process_id)))
    }

    async fn load_violation(&self, violation_id: &ViolationId) -> EngineResult<Violation> {
        self.store
            .get_violation(violation_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("violation {} not found", violation_id)))
    }

    /// Pair a store conflict with freshly read stage and owner context.
    /// A conflict after a successful pre-check means the record moved
    /// underneath the signal; other rejections pass through unchanged.
    async fn conflict_context(&self, process_id: &ProcessId, err: StorageError) -> EngineError {
        match err {
            StorageError::Conflict(detail) => match self.store.get_process(process_id).await {
                Ok(Some(current)) => invalid_transition(&current, detail),
                Ok(None) => EngineError::NotFound(format!("process {} not found", process_id)),
                Err(read_err) => read_err.into(),
            },
            other => other.into(),
        }
    }

    /// Close a record that fails its lifecycle invariants out as `error`
    /// with a closing audit entry, and hand back the corruption for the
    /// caller to report. A failure to close is logged, not propagated.
    pub(crate) async fn close_corrupt(
        &self,
        process_id: &ProcessId,
        detail: &str,
    ) -> EngineError {
        let reason = format!("closed as corrupt: record {}", detail);
        if let Err(err) = self.fail_process(process_id, &reason, self.system()).await {
            error!(process_id = %process_id, error = %err, "could not close corrupt process");
        }
        EngineError::Corruption(format!("process {} {}", process_id, detail))
    }

    fn system(&self) -> Identity {
        Identity::new(SYSTEM_ACTOR)
    }

    /// Hand a request to the notifier. Dispatch failures degrade to a
    /// warning; delivery is never awaited and never blocks a transition.
    async fn notify(&self, request: NotificationRequest) {
        let process_id = request.process_id.clone();
        if let Err(err) = self.notifier.request_notification(request).await {
            warn!(process_id = %process_id, error = %err, "notification dispatch failed");
        }
    }
}

fn invalid_transition(process: &Process, detail: impl Into<String>) -> EngineError {
    EngineError::InvalidTransition {
        detail: detail.into(),
        stage: process.stage,
        owner: process.owner.clone(),
    }
}
