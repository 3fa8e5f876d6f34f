//! Engine tuning knobs shared by the coordinator, monitor, and scheduler.

use serde::{Deserialize, Serialize};

use millgate_types::RoleTag;

/// Configuration for the pipeline engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Role whose members receive escalation notifications alongside the
    /// current owner.
    #[serde(default = "default_supervisor_role")]
    pub supervisor_role: RoleTag,

    /// Deadline sweep interval in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Resolved-violation retention sweep interval in seconds.
    #[serde(default = "default_retention_interval")]
    pub retention_interval_secs: u64,

    /// Days a resolved violation is kept before the retention sweep drops it.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supervisor_role: default_supervisor_role(),
            sweep_interval_secs: default_sweep_interval(),
            retention_interval_secs: default_retention_interval(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_supervisor_role() -> RoleTag {
    RoleTag::Supervision
}

fn default_sweep_interval() -> u64 {
    900
}

fn default_retention_interval() -> u64 {
    86_400
}

fn default_retention_days() -> i64 {
    30
}
