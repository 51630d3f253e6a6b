//! Error taxonomy for the query client.
//!
//! Only two conditions abort a query early: a missing query string and a
//! transport failure. Formatting failures are recovered by the formatter and
//! server-reported errors are plain data on the final response, so neither
//! appears here.

use thiserror::Error;

use crate::ipc::TransportError;

/// Errors that abort a query operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No query text was supplied; nothing was sent to the server.
    #[error("Missing general query.")]
    MissingQuery,

    /// Connection or protocol failure while talking to the catalog service.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl QueryError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            QueryError::MissingQuery => 1,
            QueryError::Transport(_) => 1,
        }
    }
}
