//! Broadcast groups — per-connection outboxes plus named fan-out sets.
//!
//! Each connection registers an unbounded outbound channel at upgrade time;
//! the socket task pumps it to the wire. A group is just the set of
//! connection ids currently viewing one document. Sends never block and
//! never fail loudly: a closed outbox means the socket task is already
//! tearing the connection down.

use std::collections::HashMap;

use matlist_protocol::ServerEvent;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

/// Delivery capability the session core writes against.
///
/// Exclusion is part of the broadcast operation itself so that callers never
/// filter member lists by hand.
pub trait EventSink: Send + Sync {
    /// Deliver an event to a single connection.
    fn send_to(&self, conn_id: &str, event: &ServerEvent);

    /// Deliver an event to every member of `group`, optionally excluding one
    /// connection (the sender of the triggering message).
    fn broadcast(&self, group: &str, event: &ServerEvent, exclude: Option<&str>);

    /// Add a connection to a named group.
    fn join_group(&self, group: &str, conn_id: &str);

    /// Remove a connection from a named group.
    fn leave_group(&self, group: &str, conn_id: &str);
}

/// Connection outboxes and group membership, shared between the socket tasks
/// and the session core.
#[derive(Default)]
pub struct GroupRegistry {
    outboxes: RwLock<HashMap<String, UnboundedSender<String>>>,
    groups: RwLock<HashMap<String, Vec<String>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound channel. Called by the socket task
    /// before the handler learns about the connection.
    pub fn register(&self, conn_id: &str, tx: UnboundedSender<String>) {
        self.outboxes.write().insert(conn_id.to_string(), tx);
    }

    /// Drop a connection's channel and sweep it out of every group.
    pub fn unregister(&self, conn_id: &str) {
        self.outboxes.write().remove(conn_id);
        let mut groups = self.groups.write();
        for members in groups.values_mut() {
            members.retain(|m| m != conn_id);
        }
        groups.retain(|_, members| !members.is_empty());
    }

    /// Number of live connections (used by the health endpoint and the
    /// connection cap).
    pub fn connection_count(&self) -> usize {
        self.outboxes.read().len()
    }

    fn serialize(event: &ServerEvent) -> Option<String> {
        match serde_json::to_string(event) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!("Failed to serialize outbound event: {e}");
                None
            }
        }
    }

    fn deliver(&self, conn_id: &str, frame: String) {
        let outboxes = self.outboxes.read();
        match outboxes.get(conn_id) {
            Some(tx) => {
                // A closed receiver means the socket task already exited.
                let _ = tx.send(frame);
            }
            None => debug!("No outbox for connection {conn_id}, dropping frame"),
        }
    }
}

impl EventSink for GroupRegistry {
    fn send_to(&self, conn_id: &str, event: &ServerEvent) {
        if let Some(frame) = Self::serialize(event) {
            self.deliver(conn_id, frame);
        }
    }

    fn broadcast(&self, group: &str, event: &ServerEvent, exclude: Option<&str>) {
        let members = match self.groups.read().get(group) {
            Some(members) => members.clone(),
            None => return,
        };
        let Some(frame) = Self::serialize(event) else {
            return;
        };
        for member in &members {
            if exclude.is_some_and(|skip| skip == member) {
                continue;
            }
            self.deliver(member, frame.clone());
        }
    }

    fn join_group(&self, group: &str, conn_id: &str) {
        let mut groups = self.groups.write();
        let members = groups.entry(group.to_string()).or_default();
        if !members.iter().any(|m| m == conn_id) {
            members.push(conn_id.to_string());
        }
    }

    fn leave_group(&self, group: &str, conn_id: &str) {
        let mut groups = self.groups.write();
        if let Some(members) = groups.get_mut(group) {
            members.retain(|m| m != conn_id);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }
}
