//! MatList wire protocol types.
//!
//! Every message on the socket is `{"event": <name>, "data": {...}}`. This
//! crate is the single source of truth for event names, payload shapes, and
//! the row model shared by the session core and the file catalog.

pub mod events;
pub mod rows;

pub use events::{
    CellUpdate, CellUpdated, ClientEvent, ConnectionAck, DataPayload, DataResynced,
    DocumentState, JoinDocument, MembershipChanged, ServerEvent, GUEST_DISPLAY_NAME,
    UNKNOWN_EDITOR_NAME,
};
pub use rows::{Row, STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_NOT_COMPLETED};
