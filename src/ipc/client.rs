//! Unix socket client for the catalog service.
//!
//! `IpcClient` speaks JSON-RPC 2.0 over Content-Length framing and performs
//! exactly one request/response exchange per call. It implements
//! [`Transport`], which is all the continuation engine needs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::bridge::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RoundEnvelope};
use crate::ipc::framing::{read_message, write_message};
use crate::ipc::Transport;
use crate::models::Request;

/// Default per-round timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Socket file name used for the default path.
const SOCKET_FILE_NAME: &str = "catalog-query.sock";

/// Transport-level failures. All of them are fatal to the current query.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to connect to the server socket.
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    /// A round timed out waiting for its response.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Framing, encoding or envelope error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server answered a round with a JSON-RPC error.
    #[error("Server error {code}: {message}")]
    ServerError {
        /// JSON-RPC error code
        code: i32,
        /// Error message
        message: String,
        /// Optional additional data
        data: Option<serde_json::Value>,
    },

    /// The server kept asking for more rounds past the configured limit.
    #[error("Server did not finish within {0} rounds")]
    RoundLimitExceeded(u32),
}

impl From<JsonRpcError> for TransportError {
    fn from(err: JsonRpcError) -> Self {
        TransportError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// Resolve the default socket path for the catalog service.
///
/// Resolution order:
/// 1. `$XDG_RUNTIME_DIR/catalog-query.sock` (Linux standard)
/// 2. the user cache directory (`~/Library/Caches` on macOS)
/// 3. `/tmp/catalog-query.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(SOCKET_FILE_NAME);
    }

    if let Some(cache_dir) = dirs::cache_dir() {
        return cache_dir.join(SOCKET_FILE_NAME);
    }

    PathBuf::from("/tmp").join(SOCKET_FILE_NAME)
}

/// Connection to the catalog service.
pub struct IpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Monotonically increasing request ID counter.
    request_id: AtomicU64,
    timeout: Duration,
}

impl IpcClient {
    /// Connect to the service at the given socket path.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the socket does not
    /// exist, the connection is refused, or permission is denied.
    pub async fn connect(socket_path: &Path) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(TransportError::ConnectionFailed)?;

        tracing::debug!("Connected to {}", socket_path.display());
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();

        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            request_id: AtomicU64::new(1),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Connect with retry and exponential backoff (100ms, 200ms, 400ms, ...).
    ///
    /// A `max_attempts` of zero is treated as one attempt.
    ///
    /// # Errors
    ///
    /// Returns the last connection error if all attempts fail.
    pub async fn connect_with_retry(
        socket_path: &Path,
        max_attempts: u32,
    ) -> Result<Self, TransportError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match Self::connect(socket_path).await {
                Ok(client) => return Ok(client),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(10)));
                    tracing::warn!(
                        "Connect attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Set the per-round timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send one JSON-RPC request and wait for its result.
    ///
    /// # Errors
    ///
    /// `Timeout` if no response arrives in time, `Protocol` for framing or
    /// encoding problems, `ServerError` if the server answered with an error
    /// object.
    pub async fn call(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(method, params, id);

        match timeout(self.timeout, self.send_receive(&request)).await {
            Ok(Ok(response)) => Self::process_response(id, response),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Timeout(self.timeout.as_secs())),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_receive(
        &mut self,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError> {
        let request_json = serde_json::to_string(request)
            .map_err(|e| TransportError::Protocol(format!("Failed to serialize request: {}", e)))?;

        write_message(&mut self.writer, &request_json)
            .await
            .map_err(|e| TransportError::Protocol(format!("Failed to send request: {:#}", e)))?;

        let response_json = read_message(&mut self.reader)
            .await
            .map_err(|e| TransportError::Protocol(format!("Failed to read response: {:#}", e)))?;

        serde_json::from_str(&response_json)
            .map_err(|e| TransportError::Protocol(format!("Failed to parse response: {}", e)))
    }

    fn process_response(
        id: u64,
        response: JsonRpcResponse,
    ) -> Result<serde_json::Value, TransportError> {
        if let Some(err) = response.error {
            return Err(err.into());
        }

        if let Some(got) = response.id {
            if got != id {
                return Err(TransportError::Protocol(format!(
                    "Response id {} does not match request id {}",
                    got, id
                )));
            }
        }

        response.result.ok_or_else(|| {
            TransportError::Protocol("Response missing both result and error".to_string())
        })
    }
}

#[async_trait]
impl Transport for IpcClient {
    async fn round_trip(
        &mut self,
        operation: &str,
        request: &Request,
    ) -> Result<RoundEnvelope, TransportError> {
        let result = self.call(operation, request.to_value()).await?;

        RoundEnvelope::from_result(result).map_err(|bad| {
            TransportError::Protocol(format!("Unexpected round result: {}", bad))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryParams;
    use serde_json::json;

    #[test]
    fn test_default_socket_path_format() {
        let path = default_socket_path();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), SOCKET_FILE_NAME);
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Timeout(30).to_string(),
            "Request timed out after 30s"
        );

        let server_err = TransportError::ServerError {
            code: -32000,
            message: "Catalog unavailable".to_string(),
            data: None,
        };
        assert_eq!(server_err.to_string(), "Server error -32000: Catalog unavailable");

        assert_eq!(
            TransportError::RoundLimitExceeded(8).to_string(),
            "Server did not finish within 8 rounds"
        );
    }

    #[test]
    fn test_process_response_variants() {
        let ok = IpcClient::process_response(3, JsonRpcResponse::success(3, json!({"a": 1})));
        assert_eq!(ok.unwrap(), json!({"a": 1}));

        let err = IpcClient::process_response(
            3,
            JsonRpcResponse::failure(
                3,
                JsonRpcError {
                    code: -32601,
                    message: "Method not found".to_string(),
                    data: None,
                },
            ),
        );
        assert!(matches!(err, Err(TransportError::ServerError { code: -32601, .. })));

        let mismatched = IpcClient::process_response(3, JsonRpcResponse::success(4, json!({})));
        assert!(matches!(mismatched, Err(TransportError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_connect_missing_socket_fails() {
        let path = PathBuf::from(format!(
            "/tmp/catalog-query-missing-{}.sock",
            std::process::id()
        ));
        let result = IpcClient::connect_with_retry(&path, 1).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_peer_hangup_is_protocol_error() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        let mut client = IpcClient::from_stream(client_stream);
        drop(server_stream);

        let request = Request::build(&QueryParams::new("q")).unwrap();
        let result = client.round_trip("query", &request).await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_round_trip_over_socket_pair() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        let mut client = IpcClient::from_stream(client_stream);

        let server = tokio::spawn(async move {
            let (read_half, mut write_half) = server_stream.into_split();
            let mut reader = BufReader::new(read_half);
            let raw = read_message(&mut reader).await.unwrap();
            let request: JsonRpcRequest = serde_json::from_str(&raw).unwrap();
            let reply = JsonRpcResponse::success(
                request.id,
                json!({"response": {"results": [["/a", "f1"]]}, "finished": true}),
            );
            write_message(&mut write_half, &serde_json::to_string(&reply).unwrap())
                .await
                .unwrap();
            request
        });

        let request = Request::build(&QueryParams::new("select COLL_NAME")).unwrap();
        let envelope = client.round_trip("query", &request).await.unwrap();
        assert_eq!(envelope.finished, Some(true));
        assert_eq!(envelope.response.results().unwrap().len(), 1);

        let seen = server.await.unwrap();
        assert_eq!(seen.method, "query");
        assert_eq!(seen.params, request.to_value());
    }

    #[tokio::test]
    async fn test_round_trip_times_out() {
        let (client_stream, _server_stream) = UnixStream::pair().unwrap();
        let mut client = IpcClient::from_stream(client_stream);
        client.set_timeout(Duration::from_millis(50));

        let request = Request::build(&QueryParams::new("q")).unwrap();
        let result = client.round_trip("query", &request).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }
}
