//! Client/server events for the collaborative session protocol.
//!
//! Both enums are tagged with the `event` field and carry their payload
//! under `data`, e.g.:
//!
//! ```json
//! {"event": "cell-update", "data": {"documentId": "a.mtl", "rowIndex": 0,
//!  "status": "completed", "displayName": "alice"}}
//! ```
//!
//! A message that fails to parse into [`ClientEvent`] is dropped by the
//! transport with a log entry; no error is sent back on the wire.

use serde::{Deserialize, Serialize};

use crate::rows::Row;

/// Display name of a connection that has not announced itself yet.
pub const GUEST_DISPLAY_NAME: &str = "未登录用户";
/// Attribution used when a cell update arrives without a display name.
pub const UNKNOWN_EDITOR_NAME: &str = "未知用户";

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a client can send after connecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinDocument(JoinDocument),
    DataLoaded(DataPayload),
    DataSync(DataPayload),
    CellUpdate(CellUpdate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDocument {
    pub document_id: String,
    #[serde(default = "guest_name")]
    pub display_name: String,
}

/// Full-row payload shared by `data-loaded` and `data-sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPayload {
    pub document_id: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellUpdate {
    pub document_id: String,
    /// Signed so that out-of-range negatives reach the coordinator's bounds
    /// check instead of dying in the schema layer.
    pub row_index: i64,
    pub status: String,
    #[serde(default = "unknown_editor")]
    pub display_name: String,
}

fn guest_name() -> String {
    GUEST_DISPLAY_NAME.into()
}

fn unknown_editor() -> String {
    UNKNOWN_EDITOR_NAME.into()
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the server can push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    ConnectionAck(ConnectionAck),
    DocumentState(DocumentState),
    MembershipChanged(MembershipChanged),
    DataResynced(DataResynced),
    CellUpdated(CellUpdated),
}

/// Sent to a connection right after it is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAck {
    pub message: String,
    pub user_count: usize,
    pub connection_id: String,
}

/// Current rows of a document, sent privately to a joiner when the session
/// already holds data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub document_id: String,
    pub rows: Vec<Row>,
}

/// Membership update fanned out to a document's group on join and leave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChanged {
    pub user_count: usize,
    pub display_names: Vec<String>,
}

/// Full-row resynchronization, fanned out to everyone but the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResynced {
    pub document_id: String,
    pub rows: Vec<Row>,
}

/// Single-cell status change, fanned out to everyone but the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellUpdated {
    pub row_index: usize,
    pub status: String,
    pub document_id: String,
    pub display_name: String,
}
