//! Pure decision rules for the millgate pipeline.
//!
//! Two concerns live here, both deterministic and free of I/O:
//!
//! - [`resolve`] decides which conditional stages a batch must pass,
//!   from its grade and size designation, with a human-readable reason
//!   for every positive decision.
//! - [`deadline_for`] computes the wall-clock deadline for a process
//!   window from its priority and resolved requirement flags.
//!
//! Both are callable concurrently without locking; neither ever fails.
//! An unparseable size is a valid outcome ([`SizeSpec::Unrecognized`]),
//! not an error.

#![deny(unsafe_code)]

pub mod deadline;
pub mod requirements;

pub use deadline::{base_hours, deadline_for};
pub use requirements::{resolve, RequirementDecision, SizeSpec};
