//! Session coordinator — join/leave, state delivery, and edit fan-out.
//!
//! One lock guards the connection registry and the session store together,
//! and every operation runs to completion under it: operations are serialized
//! in arrival order, and a broadcast always reflects the mutation that
//! triggered it. The lock is never held across `.await` or I/O — there is no
//! I/O anywhere in this crate; fan-out is a non-blocking channel push per
//! group member.

use std::sync::Arc;

use matlist_protocol::{
    CellUpdated, ClientEvent, ConnectionAck, DataResynced, DocumentState, MembershipChanged, Row,
    ServerEvent,
};
use matlist_transport::{EventSink, SessionHandler};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::registry::ConnectionRegistry;
use crate::store::SessionStore;

/// How a full-document overwrite arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOrigin {
    /// A client seeded freshly parsed data; nobody else needs to hear it.
    Loaded,
    /// A client is forcing the group back into agreement; peers get a resync.
    Sync,
}

struct CoordinatorState {
    connections: ConnectionRegistry,
    sessions: SessionStore,
}

/// The protocol engine. Constructed once at process start; shared with the
/// transport as the session handler.
pub struct SessionCoordinator {
    state: Mutex<CoordinatorState>,
    sink: Arc<dyn EventSink>,
}

impl SessionCoordinator {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                connections: ConnectionRegistry::new(),
                sessions: SessionStore::new(),
            }),
            sink,
        }
    }

    /// Join `conn_id` to a document's session, creating the session on first
    /// use. Joining while viewing another document leaves that one first.
    ///
    /// A joiner receives the current rows privately when the session already
    /// holds data; then the whole group (joiner included) gets the updated
    /// membership.
    pub fn join(
        &self,
        document_id: &str,
        conn_id: &str,
        display_name: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();

        if state.connections.get(conn_id).is_none() {
            return Err(SessionError::UnknownConnection(conn_id.into()));
        }

        // Switching documents implicitly vacates the old group.
        let previous = state
            .connections
            .get(conn_id)
            .and_then(|c| c.current_document.clone());
        if let Some(previous) = previous {
            if previous != document_id {
                self.leave_locked(&mut state, &previous, conn_id);
            }
        }

        state.connections.set_identity(conn_id, display_name);
        if let Some(conn) = state.connections.get_mut(conn_id) {
            conn.current_document = Some(document_id.to_string());
        }

        let session = state.sessions.get_or_create(document_id);
        session.add_member(conn_id, display_name);
        let current_rows = (!session.rows.is_empty()).then(|| session.rows.clone());
        let membership = MembershipChanged {
            user_count: session.member_count(),
            display_names: session.display_names(),
        };

        self.sink.join_group(document_id, conn_id);
        if let Some(rows) = current_rows {
            self.sink.send_to(
                conn_id,
                &ServerEvent::DocumentState(DocumentState {
                    document_id: document_id.to_string(),
                    rows,
                }),
            );
        }
        info!(
            "{display_name} joined {document_id} ({} viewing)",
            membership.user_count
        );
        self.sink.broadcast(
            document_id,
            &ServerEvent::MembershipChanged(membership),
            None,
        );
        Ok(())
    }

    /// Replace a document's rows wholesale. The `Sync` origin additionally
    /// resynchronizes every other group member; `Loaded` is silent.
    pub fn replace_data(
        &self,
        document_id: &str,
        rows: Vec<Row>,
        origin: ReplaceOrigin,
        sender: &str,
    ) {
        let mut state = self.state.lock();
        let session = state.sessions.get_or_create(document_id);
        session.rows = rows;

        match origin {
            ReplaceOrigin::Loaded => {
                debug!(
                    "Seeded {} rows into {document_id}",
                    session.rows.len()
                );
            }
            ReplaceOrigin::Sync => {
                info!(
                    "Resyncing {document_id} from {sender} ({} rows)",
                    session.rows.len()
                );
                let resync = DataResynced {
                    document_id: document_id.to_string(),
                    rows: session.rows.clone(),
                };
                self.sink.broadcast(
                    document_id,
                    &ServerEvent::DataResynced(resync),
                    Some(sender),
                );
            }
        }
    }

    /// Set one row's status and fan the change out to everyone in the group
    /// but the sender. Unknown documents and out-of-range indices change
    /// nothing and notify nobody — the caller logs and drops.
    pub fn update_cell(
        &self,
        document_id: &str,
        row_index: i64,
        status: &str,
        display_name: &str,
        sender: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        let Some(session) = state.sessions.get_mut(document_id) else {
            return Err(SessionError::UnknownDocument(document_id.into()));
        };

        let len = session.rows.len();
        if row_index < 0 || row_index as usize >= len {
            return Err(SessionError::RowIndexOutOfRange {
                document_id: document_id.to_string(),
                index: row_index,
                len,
            });
        }

        let row_index = row_index as usize;
        session.rows[row_index].status = status.to_string();

        debug!("{display_name} set {document_id}[{row_index}] = {status}");
        self.sink.broadcast(
            document_id,
            &ServerEvent::CellUpdated(CellUpdated {
                row_index,
                status: status.to_string(),
                document_id: document_id.to_string(),
                display_name: display_name.to_string(),
            }),
            Some(sender),
        );
        Ok(())
    }

    /// Remove `conn_id` from a document's group. Deletes the session (rows
    /// included — durable saves are the catalog's business and must have
    /// happened already) when the last member leaves; otherwise notifies the
    /// remaining members.
    fn leave_locked(&self, state: &mut CoordinatorState, document_id: &str, conn_id: &str) {
        self.sink.leave_group(document_id, conn_id);

        let Some(session) = state.sessions.get_mut(document_id) else {
            debug!("Leave for untracked document {document_id}");
            return;
        };
        if !session.remove_member(conn_id) {
            return;
        }

        if session.has_members() {
            let membership = MembershipChanged {
                user_count: session.member_count(),
                display_names: session.display_names(),
            };
            self.sink.broadcast(
                document_id,
                &ServerEvent::MembershipChanged(membership),
                None,
            );
        } else {
            state.sessions.remove(document_id);
            info!("Document session closed: {document_id}");
        }
    }

    // ── Read-only views (health, tests) ─────────────────────────────────

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn has_session(&self, document_id: &str) -> bool {
        self.state.lock().sessions.contains(document_id)
    }

    pub fn member_count(&self, document_id: &str) -> usize {
        self.state
            .lock()
            .sessions
            .get(document_id)
            .map_or(0, |s| s.member_count())
    }

    /// Snapshot of a document's rows, if its session exists.
    pub fn document_rows(&self, document_id: &str) -> Option<Vec<Row>> {
        self.state
            .lock()
            .sessions
            .get(document_id)
            .map(|s| s.rows.clone())
    }
}

impl SessionHandler for SessionCoordinator {
    fn on_connect(&self, conn_id: &str) {
        let mut state = self.state.lock();
        state.connections.insert(conn_id);
        let user_count = state.connections.len();
        info!("Connection registered: {conn_id} ({user_count} online)");
        self.sink.send_to(
            conn_id,
            &ServerEvent::ConnectionAck(ConnectionAck {
                message: "connected".into(),
                user_count,
                connection_id: conn_id.to_string(),
            }),
        );
    }

    fn on_event(&self, conn_id: &str, event: ClientEvent) {
        let result = match event {
            ClientEvent::JoinDocument(join) => {
                self.join(&join.document_id, conn_id, &join.display_name)
            }
            ClientEvent::DataLoaded(payload) => {
                self.replace_data(
                    &payload.document_id,
                    payload.rows,
                    ReplaceOrigin::Loaded,
                    conn_id,
                );
                Ok(())
            }
            ClientEvent::DataSync(payload) => {
                self.replace_data(
                    &payload.document_id,
                    payload.rows,
                    ReplaceOrigin::Sync,
                    conn_id,
                );
                Ok(())
            }
            ClientEvent::CellUpdate(update) => self.update_cell(
                &update.document_id,
                update.row_index,
                &update.status,
                &update.display_name,
                conn_id,
            ),
        };
        if let Err(e) = result {
            warn!("Dropped event from {conn_id}: {e}");
        }
    }

    fn on_disconnect(&self, conn_id: &str) {
        let mut state = self.state.lock();
        let Some(conn) = state.connections.remove(conn_id) else {
            // Resource absence is a no-op, never fatal.
            debug!("Disconnect for unknown connection {conn_id}");
            return;
        };
        if let Some(document_id) = conn.current_document {
            self.leave_locked(&mut state, &document_id, conn_id);
        }
        info!(
            "Connection removed: {conn_id} ({} online)",
            state.connections.len()
        );
    }
}
