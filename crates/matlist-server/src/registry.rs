//! Connection registry — one entry per live socket.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use matlist_protocol::GUEST_DISPLAY_NAME;

/// State tracked for one connected client.
///
/// Created at transport connect, destroyed at disconnect, never persisted.
/// `current_document` is the one document this connection is joined to;
/// joining another document replaces it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub conn_id: String,
    pub display_name: String,
    pub current_document: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// All live connections, keyed by connection id.
///
/// Plain map, no interior locking: the coordinator owns it and mutates it
/// under its own lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection with the guest display name.
    pub fn insert(&mut self, conn_id: &str) {
        self.connections.insert(
            conn_id.to_string(),
            Connection {
                conn_id: conn_id.to_string(),
                display_name: GUEST_DISPLAY_NAME.into(),
                current_document: None,
                joined_at: Utc::now(),
            },
        );
    }

    pub fn remove(&mut self, conn_id: &str) -> Option<Connection> {
        self.connections.remove(conn_id)
    }

    pub fn get(&self, conn_id: &str) -> Option<&Connection> {
        self.connections.get(conn_id)
    }

    pub fn get_mut(&mut self, conn_id: &str) -> Option<&mut Connection> {
        self.connections.get_mut(conn_id)
    }

    /// Update the display name once a client announces itself.
    pub fn set_identity(&mut self, conn_id: &str, display_name: &str) {
        if let Some(conn) = self.connections.get_mut(conn_id) {
            conn.display_name = display_name.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
