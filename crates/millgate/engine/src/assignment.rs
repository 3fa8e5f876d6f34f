//! Owner selection for pipeline stages.
//!
//! Every stage entry needs exactly one owner. The resolver asks the role
//! directory for the active members of the stage's responsible role and picks
//! one uniformly at random to spread load. Resolution is total: when the
//! directory has no members for the role, or the lookup itself fails, the
//! stage falls back to the original requester so the pipeline never stalls
//! on staffing. Degraded picks carry the reason so the audit trail shows why
//! the requester ended up owning a stage outside their role.

use rand::seq::SliceRandom;
use serde_json::json;

use millgate_types::{Identity, RoleTag};

use crate::ports::RoleDirectory;

/// Where the selected owner came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentSource {
    /// Picked from the role directory's active membership.
    Directory,
    /// Directory had no usable members; the requester owns the stage.
    Fallback { reason: String },
}

/// Outcome of resolving an owner for a stage.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub owner: Identity,
    pub source: AssignmentSource,
}

impl Assignment {
    /// Metadata block recorded on the assignment audit entry.
    pub fn audit_metadata(&self, role: RoleTag) -> serde_json::Value {
        match &self.source {
            AssignmentSource::Directory => json!({
                "role": role,
                "source": "directory",
            }),
            AssignmentSource::Fallback { reason } => json!({
                "role": role,
                "source": "fallback",
                "degraded": reason,
            }),
        }
    }
}

/// Resolve an owner for a stage handled by `role`.
///
/// Never fails: membership lookup errors and empty rosters both degrade to
/// the `fallback` identity with the reason preserved.
pub async fn assign(
    directory: &dyn RoleDirectory,
    role: RoleTag,
    fallback: &Identity,
) -> Assignment {
    let members = match directory.active_members(role).await {
        Ok(members) => members,
        Err(err) => {
            return Assignment {
                owner: fallback.clone(),
                source: AssignmentSource::Fallback {
                    reason: err.to_string(),
                },
            };
        }
    };

    match members.choose(&mut rand::thread_rng()) {
        Some(owner) => Assignment {
            owner: owner.clone(),
            source: AssignmentSource::Directory,
        },
        None => Assignment {
            owner: fallback.clone(),
            source: AssignmentSource::Fallback {
                reason: format!("no active members for role {role}"),
            },
        },
    }
}
