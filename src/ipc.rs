//! Transport to the catalog service.
//!
//! ```text
//! ┌──────────────────┐        Unix Socket          ┌──────────────────┐
//! │  catalog-query   │ ◄──────────────────────────►│ catalog service  │
//! │   (IpcClient)    │   JSON-RPC 2.0 + framing    │                  │
//! └──────────────────┘                             └──────────────────┘
//! ```
//!
//! One query is a sequence of rounds. Each round sends the current request
//! document as the params of a JSON-RPC call and receives a
//! [`RoundEnvelope`](crate::bridge::RoundEnvelope) back:
//!
//! ```text
//! Content-Length: 92\r\n
//! \r\n
//! {"jsonrpc":"2.0","method":"query","params":{"query":"select COLL_NAME","progress":false},"id":1}
//! ```
//!
//! Connection pooling, retry and timeouts live here; the continuation
//! engine only sees the [`Transport`] trait.

mod client;
mod framing;

use async_trait::async_trait;

use crate::bridge::RoundEnvelope;
use crate::models::Request;

pub use client::{default_socket_path, IpcClient, TransportError, DEFAULT_TIMEOUT_SECS};
pub use framing::{read_message, write_message, MAX_MESSAGE_SIZE};

/// One request/response exchange with the catalog service.
///
/// Implementations block (asynchronously) until the round's response
/// arrives or the exchange fails. Any retry policy belongs to the
/// implementation; an error returned from here ends the query.
#[async_trait]
pub trait Transport: Send {
    /// Send `request` as the params of `operation` and return the round's
    /// response together with the server's terminal marker.
    async fn round_trip(
        &mut self,
        operation: &str,
        request: &Request,
    ) -> Result<RoundEnvelope, TransportError>;
}
