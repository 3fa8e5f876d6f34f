//! Outbound ports: the collaborators the engine calls but never owns.
//!
//! The coordinator talks to the surrounding QMS through two narrow
//! interfaces: a role directory answering "who is active in this role
//! right now", and a notifier that accepts notification requests
//! fire-and-forget. Delivery mechanics (channels, retries, backoff) live
//! entirely behind the notifier port.

use async_trait::async_trait;
use millgate_types::{Identity, ProcessId, RoleTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure of an outbound collaborator call.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("role directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("notification dispatch failed: {0}")]
    DispatchFailed(String),
}

/// Membership lookup for responsibility roles.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Currently-active members of a role, in no particular order.
    async fn active_members(&self, role: RoleTag) -> Result<Vec<Identity>, PortError>;
}

/// What a notification is about. The messaging collaborator picks the
/// channel and wording per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A process was escalated.
    Escalation,
    /// A process finished its pipeline.
    Completion,
}

/// One outbound notification request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub recipients: Vec<Identity>,
    pub process_id: ProcessId,
    pub message: String,
    /// Structured context for the messaging collaborator.
    pub payload: serde_json::Value,
}

/// Outbound notification port. Fire-and-forget: a successful return means
/// the request was handed over, not that anything was delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_notification(&self, request: NotificationRequest) -> Result<(), PortError>;
}

// ── Reference adapters ───────────────────────────────────────────────

/// Role directory backed by a fixed membership table.
///
/// Suits deployments where membership comes from configuration rather
/// than a live directory service, and doubles as the test directory.
#[derive(Default)]
pub struct StaticRoleDirectory {
    members: RwLock<HashMap<RoleTag, Vec<Identity>>>,
}

impl StaticRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the member list of one role.
    pub fn set_members(&self, role: RoleTag, members: Vec<Identity>) {
        if let Ok(mut guard) = self.members.write() {
            guard.insert(role, members);
        }
    }
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
    async fn active_members(&self, role: RoleTag) -> Result<Vec<Identity>, PortError> {
        let guard = self
            .members
            .read()
            .map_err(|_| PortError::DirectoryUnavailable("membership lock poisoned".to_string()))?;
        Ok(guard.get(&role).cloned().unwrap_or_default())
    }
}

/// Notifier that forwards requests into an unbounded channel.
///
/// The daemon drains the receiving end and hands requests to the real
/// messaging system; tests drain it to observe outbound traffic.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<NotificationRequest>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn request_notification(&self, request: NotificationRequest) -> Result<(), PortError> {
        self.tx
            .send(request)
            .map_err(|_| PortError::DispatchFailed("notification channel closed".to_string()))
    }
}

/// Notifier that records every request. Test double.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything requested so far, in order.
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn request_notification(&self, request: NotificationRequest) -> Result<(), PortError> {
        self.sent
            .lock()
            .map_err(|_| PortError::DispatchFailed("record lock poisoned".to_string()))?
            .push(request);
        Ok(())
    }
}
