//! Session failure reasons.
//!
//! None of these reach the wire: every failure path in the core degrades to
//! a logged warning and the triggering message is dropped.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection {0} is not registered")]
    UnknownConnection(String),

    #[error("document {0} has no active session")]
    UnknownDocument(String),

    #[error("row index {index} out of range for document {document_id} ({len} rows)")]
    RowIndexOutOfRange {
        document_id: String,
        index: i64,
        len: usize,
    },
}
