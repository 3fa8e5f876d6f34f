//! Domain types for the millgate inspection pipeline.
//!
//! One [`Process`] tracks a single material batch through the fixed
//! inspection pipeline: intake, quality inspection, conditional laboratory
//! stages, production prep and final approval. Every transition leaves an
//! immutable [`AuditEntry`]; missed deadlines surface as [`Violation`]s.
//!
//! This crate is data only: no I/O, no clocks other than what callers pass
//! in, no decision tables (those live in `millgate-rules`).

#![deny(unsafe_code)]

pub mod audit;
pub mod identity;
pub mod material;
pub mod process;
pub mod violation;

pub use audit::{ActionKind, AuditAppend, AuditEntry};
pub use identity::{Identity, RoleTag};
pub use material::{BatchIntake, BatchIntakeId};
pub use process::{
    Priority, Process, ProcessId, ProcessStatus, RequirementFlags, SlaStatus, Stage,
};
pub use violation::{Violation, ViolationId, ViolationSeverity, ViolationState};
