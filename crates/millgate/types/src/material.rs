//! Batch intake facts handed over by the warehouse system.

use serde::{Deserialize, Serialize};

// ── Intake identifier ────────────────────────────────────────────────

/// Identifier of the upstream goods-in record a process is bound to.
///
/// Assigned by the warehouse system; opaque here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchIntakeId(pub String);

impl BatchIntakeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchIntakeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Batch intake ─────────────────────────────────────────────────────

/// The facts about an incoming batch needed to start a process.
///
/// Grade and size arrive already resolved; certificate parsing happens
/// upstream. The size stays a free-form string here, interpreted by
/// `millgate-rules` when requirements are resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchIntake {
    /// Upstream goods-in record.
    pub id: BatchIntakeId,
    /// Material grade designation, e.g. `12X18H10T`.
    pub material_grade: String,
    /// Free-form size designation, e.g. `⌀150` or `лист 20мм`.
    pub material_size: String,
    /// Supplier name, if known. Carried into the created audit entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    /// Supplier batch / heat number, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
}

impl BatchIntake {
    pub fn new(
        id: BatchIntakeId,
        material_grade: impl Into<String>,
        material_size: impl Into<String>,
    ) -> Self {
        Self {
            id,
            material_grade: material_grade.into(),
            material_size: material_size.into(),
            supplier: None,
            batch_number: None,
        }
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_batch_number(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }
}
