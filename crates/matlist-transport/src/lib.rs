//! WebSocket transport for MatList.
//!
//! Owns the sockets and nothing else: accepts connections, parses inbound
//! frames into protocol events for a [`SessionHandler`], and delivers
//! outbound events through named broadcast groups with optional
//! exclude-the-sender fan-out. Session semantics live entirely behind the
//! handler seam.

pub mod groups;
pub mod server;

pub use groups::{EventSink, GroupRegistry};
pub use server::{SessionHandler, TransportConfig, TransportServer};
