//! Storage contracts for the millgate pipeline.
//!
//! This crate defines the persistence seams the coordinator and monitor
//! work against:
//! - process records with guarded lifecycle mutators (system of record)
//! - SLA violation records with a one-open-per-process invariant
//! - an append-only, hash-chained audit log
//!
//! Mutators are deliberately narrow. Instead of a generic `update`, each
//! write names the transition it performs and fails with
//! [`StorageError::Conflict`] when the stored record is not in the state
//! the transition requires, or [`StorageError::InvariantViolation`] when
//! the write itself would corrupt stored data. That keeps every lifecycle
//! invariant enforceable at the storage boundary no matter which adapter
//! backs it.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryPipelineStore;
pub use traits::{AuditStore, PipelineStore, ProcessStore, QueryWindow, ViolationStore};
