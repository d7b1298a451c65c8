//! MatList file catalog services.
//!
//! Everything durable lives here, out-of-band of the session core: parsing
//! uploaded material lists, packing arithmetic, and the snapshot files under
//! the upload directory. The core never calls into this crate — clients
//! persist explicitly through the HTTP routes and then seed sessions over
//! the socket.

pub mod catalog;
pub mod packing;
pub mod parser;
pub mod routes;

pub use catalog::{Catalog, CatalogError, FileEntry};
pub use packing::{split_quantity, GROUPS_PER_BOX, ITEMS_PER_GROUP};
