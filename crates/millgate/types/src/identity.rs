//! Identities and responsibility roles.

use serde::{Deserialize, Serialize};

// ── Identity ─────────────────────────────────────────────────────────

/// Reference to a person or system account known to the surrounding QMS.
///
/// The pipeline never authenticates identities; it records who requested,
/// owns or performed something. Upstream systems guarantee validity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Role tags ────────────────────────────────────────────────────────

/// A named responsibility category used for automatic stage assignment.
///
/// The pipeline topology is fixed, so the role vocabulary is too. Membership
/// is resolved at assignment time through the role directory port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    /// Goods-in staff receiving batches.
    Warehouse,
    /// Quality-control inspectors.
    Quality,
    /// Laboratory technicians and chemists.
    Laboratory,
    /// Production preparation operators.
    Production,
    /// Supervisors and process managers.
    Supervision,
}

impl RoleTag {
    pub const ALL: [RoleTag; 5] = [
        RoleTag::Warehouse,
        RoleTag::Quality,
        RoleTag::Laboratory,
        RoleTag::Production,
        RoleTag::Supervision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::Warehouse => "warehouse",
            RoleTag::Quality => "quality",
            RoleTag::Laboratory => "laboratory",
            RoleTag::Production => "production",
            RoleTag::Supervision => "supervision",
        }
    }
}

impl std::fmt::Display for RoleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
