//! MatList session core — the protocol engine for shared material lists.
//!
//! The coordinator owns all connection and document-session state and is the
//! only writer of either. It talks to the outside world exclusively through
//! the transport's `EventSink`, so the whole crate is free of I/O.

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod store;

pub use coordinator::{ReplaceOrigin, SessionCoordinator};
pub use error::SessionError;
pub use registry::{Connection, ConnectionRegistry};
pub use store::{DocumentSession, Member, SessionStore};
