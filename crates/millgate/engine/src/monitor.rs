//! Deadline surveillance.
//!
//! The deadline sweep reads every active process carrying a deadline and
//! classifies its remaining window. New pressure opens a violation; worse
//! pressure upgrades the open record in place. Escalation fires only when
//! a violation is created at or upgraded to critical or overdue severity;
//! a violation that merely persists never escalates twice. A terminal
//! transition landing mid-sweep wins: the sweep stands down on that
//! record and re-evaluates from fresh state next pass. A record that
//! fails its lifecycle invariants is closed out as error; one broken
//! record never stops the rest of the sweep.
//!
//! The retention sweep drops resolved violations once they age past the
//! configured horizon.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use millgate_storage::{PipelineStore, StorageError};
use millgate_types::{Identity, Process, ProcessId, SlaStatus, Violation, ViolationSeverity};

use crate::config::EngineConfig;
use crate::coordinator::{PipelineCoordinator, SYSTEM_ACTOR};
use crate::error::{EngineError, EngineResult};

/// Counters from one deadline sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    /// Active deadline-carrying processes examined.
    pub examined: usize,
    /// Violations opened this sweep.
    pub violations_created: usize,
    /// Open violations upgraded to a worse severity.
    pub violations_upgraded: usize,
    /// Escalations applied for critical or overdue pressure.
    pub escalations: usize,
    /// Processes the sweep could not handle.
    pub failures: usize,
}

impl SweepReport {
    /// True when the sweep changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.violations_created == 0
            && self.violations_upgraded == 0
            && self.escalations == 0
            && self.failures == 0
    }
}

/// Watches active processes for deadline pressure.
pub struct SlaMonitor {
    store: Arc<dyn PipelineStore>,
    coordinator: Arc<PipelineCoordinator>,
    config: EngineConfig,
}

impl SlaMonitor {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        coordinator: Arc<PipelineCoordinator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            coordinator,
            config,
        }
    }

    /// Run one deadline sweep at the given instant.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let candidates = match self.store.active_with_deadline().await {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = %err, "deadline sweep could not list processes");
                report.failures += 1;
                return report;
            }
        };

        for process in candidates {
            report.examined += 1;
            if let Err(err) = self.sweep_one(&process, now, &mut report).await {
                // One broken record never stops the rest of the sweep.
                report.failures += 1;
                error!(process_id = %process.id, error = %err, "sweep skipped process");
            }
        }

        if report.is_quiet() {
            debug!(examined = report.examined, "deadline sweep found nothing new");
        } else {
            info!(
                examined = report.examined,
                created = report.violations_created,
                upgraded = report.violations_upgraded,
                escalations = report.escalations,
                failures = report.failures,
                "deadline sweep finished"
            );
        }
        report
    }

    async fn sweep_one(
        &self,
        process: &Process,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> EngineResult<()> {
        // Requirement flags freeze before a record activates; an active
        // record without them cannot have its deadline recomputed. That
        // corruption is fatal to the process itself, not just to this
        // sweep pass.
        if process.requirements.is_none() {
            report.failures += 1;
            let err = self
                .coordinator
                .close_corrupt(&process.id, "is active without resolved requirements")
                .await;
            error!(process_id = %process.id, error = %err, "sweep closed corrupt process");
            return Ok(());
        }

        let severity = match process.sla_status(now) {
            None | Some(SlaStatus::Ok) => return Ok(()),
            Some(SlaStatus::Warning) => ViolationSeverity::Warning,
            Some(SlaStatus::Critical) => ViolationSeverity::Critical,
            Some(SlaStatus::Overdue) => ViolationSeverity::Overdue,
        };
        let message = pressure_message(process, severity, now);

        match self.store.open_violation_for(&process.id).await? {
            None => {
                let violation =
                    Violation::new(process.id.clone(), severity, message.clone(), now);
                if let Err(err) = self.store.create_violation(violation).await {
                    return race_outcome(&process.id, err);
                }
                report.violations_created += 1;
                if severity >= ViolationSeverity::Critical
                    && self.escalate(process, &message, now).await?
                {
                    report.escalations += 1;
                }
            }
            Some(existing) if severity > existing.severity => {
                if let Err(err) = self
                    .store
                    .upgrade_violation(&existing.id, severity, &message, now)
                    .await
                {
                    return race_outcome(&process.id, err);
                }
                report.violations_upgraded += 1;
                if severity >= ViolationSeverity::Critical
                    && self.escalate(process, &message, now).await?
                {
                    report.escalations += 1;
                }
            }
            // Standing pressure at an unchanged severity has already been
            // recorded and escalated; say nothing new.
            Some(_) => {}
        }
        Ok(())
    }

    /// Escalate through the coordinator unless completion won the race
    /// between listing and acting.
    async fn escalate(
        &self,
        process: &Process,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let Some(current) = self.store.get_process(&process.id).await? else {
            return Ok(false);
        };
        if !current.is_active() {
            return Ok(false);
        }
        match self
            .coordinator
            .apply_escalation(&current, reason, &Identity::new(SYSTEM_ACTOR), now)
            .await
        {
            Ok(_) => Ok(true),
            // A transition that closed the record mid-escalation wins.
            Err(EngineError::InvalidTransition { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Drop resolved violations older than the retention horizon. Returns
    /// how many were removed.
    pub async fn run_retention(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.config.retention_days);
        match self.store.purge_resolved_before(cutoff).await {
            Ok(0) => 0,
            Ok(purged) => {
                info!(purged, cutoff = %cutoff, "dropped old resolved violations");
                purged
            }
            Err(err) => {
                error!(error = %err, "violation retention sweep failed");
                0
            }
        }
    }
}

/// A guard rejection on a violation write means another writer got there
/// first; the next sweep re-evaluates from fresh state. Backend and
/// serialization failures still propagate.
fn race_outcome(process_id: &ProcessId, err: StorageError) -> EngineResult<()> {
    match err {
        StorageError::Backend(_) | StorageError::Serialization(_) => Err(err.into()),
        _ => {
            debug!(process_id = %process_id, error = %err, "violation write lost a race");
            Ok(())
        }
    }
}

fn pressure_message(
    process: &Process,
    severity: ViolationSeverity,
    now: DateTime<Utc>,
) -> String {
    match (severity, process.deadline) {
        (ViolationSeverity::Overdue, Some(deadline)) => format!(
            "deadline passed {} minutes ago",
            (now - deadline).num_minutes()
        ),
        (ViolationSeverity::Critical, Some(deadline)) => format!(
            "a fifth or less of the window remains, due {}",
            deadline.to_rfc3339()
        ),
        (ViolationSeverity::Warning, Some(deadline)) => format!(
            "half or less of the window remains, due {}",
            deadline.to_rfc3339()
        ),
        // Deadline-free processes never reach the sweep.
        (_, None) => format!("{} deadline pressure", severity),
    }
}
