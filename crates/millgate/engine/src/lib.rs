//! Pipeline engine for millgate.
//!
//! The engine turns batch intake records into staged approval processes
//! and drives them with three cooperating parts:
//! - the [`PipelineCoordinator`] applies inbound signals (process start,
//!   stage completion, cancellation, escalation) against the store and
//!   the outbound ports
//! - the [`SlaMonitor`] sweeps active deadlines into violations and
//!   escalations
//! - the [`SweepScheduler`] runs the sweeps on an interval and accepts
//!   manual triggers
//!
//! Stage topology and progress arithmetic live in [`state_machine`]; the
//! role directory and notification seams live in [`ports`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod assignment;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod monitor;
pub mod ports;
pub mod scheduler;
pub mod state_machine;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use coordinator::PipelineCoordinator;
pub use error::{EngineError, EngineResult};
pub use monitor::{SlaMonitor, SweepReport};
pub use ports::{
    ChannelNotifier, NotificationKind, NotificationRequest, Notifier, PortError,
    RecordingNotifier, RoleDirectory, StaticRoleDirectory,
};
pub use scheduler::SweepScheduler;
