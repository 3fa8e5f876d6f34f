//! SLA deadline computation.
//!
//! The window is process-scoped: a base number of hours per priority plus
//! an allowance for conditional laboratory stages. Anchored at process
//! start on creation and at the escalation time on escalation, so an
//! escalated process always gets a forward-looking deadline.

use chrono::{DateTime, Duration, Utc};
use millgate_types::{Priority, RequirementFlags};

/// Base response window per priority, in hours.
pub fn base_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Urgent => 12,
        Priority::High => 24,
        Priority::Normal => 72,
        Priority::Low => 120,
    }
}

/// Allowance for conditional stages: both +24h, exactly one +12h.
fn conditional_hours(flags: RequirementFlags) -> i64 {
    match flags.conditional_count() {
        2 => 24,
        1 => 12,
        _ => 0,
    }
}

/// Compute the deadline for a process window anchored at `from`.
pub fn deadline_for(
    from: DateTime<Utc>,
    priority: Priority,
    flags: RequirementFlags,
) -> DateTime<Utc> {
    from + Duration::hours(base_hours(priority) + conditional_hours(flags))
}
