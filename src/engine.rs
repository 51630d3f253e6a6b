//! Continuation engine.
//!
//! Drives one logical query through as many rounds as the server asks for:
//!
//! ```text
//!            ┌───────────── not finished ─────────────┐
//!            ▼                                        │
//!   ┌──────────────┐  send   ┌─────────┐  progress,   │
//!   │   Running    │ ──────► │ Server  │ ──results──► merge
//!   └──────────────┘         └─────────┘              │
//!      │ token cancelled                    finished  │
//!      ▼                                              ▼
//!   Cancelled                                     Completed
//! ```
//!
//! A round whose envelope carries no `finished` marker is terminal when it
//! returns no rows and leaves the next request unchanged.
//!
//! The cancellation token is checked before every send, so once it fires at
//! most the round already in flight completes. A round in flight is never
//! aborted.

use tokio_util::sync::CancellationToken;

use crate::bridge::RoundEnvelope;
use crate::ipc::{Transport, TransportError};
use crate::models::{Request, Response};
use crate::output::{OutputSink, ResultFormatter};
use crate::progress::ProgressReporter;

/// Operation name sent as the JSON-RPC method.
pub const QUERY_OPERATION: &str = "query";

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Cancelled,
    Completed,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineState::Running)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on rounds; `None` trusts the server to finish.
    pub max_rounds: Option<u32>,
}

/// How a query ended.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// `Cancelled` or `Completed`.
    pub state: EngineState,
    /// Last response received; empty if cancelled before the first round.
    pub response: Response,
    /// The request that would have been sent next.
    pub request: Request,
    /// Rounds actually sent.
    pub rounds: u32,
}

impl QueryOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.state == EngineState::Cancelled
    }
}

/// Runs the round-trip loop against a [`Transport`].
pub struct ContinuationEngine<T> {
    transport: T,
    cancel: CancellationToken,
    config: EngineConfig,
    operation: String,
}

impl<T: Transport> ContinuationEngine<T> {
    pub fn new(transport: T, cancel: CancellationToken) -> Self {
        Self {
            transport,
            cancel,
            config: EngineConfig::default(),
            operation: QUERY_OPERATION.to_string(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the query to a terminal state.
    ///
    /// Progress and rows are emitted as each round arrives, before the next
    /// request goes out.
    ///
    /// # Errors
    ///
    /// Any transport failure ends the loop immediately, as does exceeding
    /// `max_rounds` (`TransportError::RoundLimitExceeded`).
    pub async fn run(
        &mut self,
        initial: Request,
        progress: &mut dyn ProgressReporter,
        formatter: &ResultFormatter,
        sink: &mut dyn OutputSink,
    ) -> Result<QueryOutcome, TransportError> {
        let mut state = EngineState::Running;
        let mut request = initial;
        let mut response = Response::default();
        let mut rounds: u32 = 0;

        while state == EngineState::Running {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation observed after {} round(s)", rounds);
                state = EngineState::Cancelled;
                continue;
            }

            if let Some(max) = self.config.max_rounds {
                if rounds >= max {
                    tracing::warn!("Server still continuing after {} rounds, giving up", max);
                    return Err(TransportError::RoundLimitExceeded(max));
                }
            }

            rounds += 1;
            tracing::debug!(round = rounds, operation = %self.operation, "Sending round");

            let RoundEnvelope {
                response: latest,
                finished,
            } = self.transport.round_trip(&self.operation, &request).await?;

            if let Some(token) = latest.progress_token() {
                progress.report(&token);
            }

            if let Some(results) = latest.results_value().filter(|v| !v.is_null()) {
                let summary = formatter.render_value(results, sink);
                tracing::debug!(
                    round = rounds,
                    rows = summary.rows,
                    failures = summary.failures,
                    "Rendered results"
                );
            }

            let next = request.merged_with(&latest);
            // Without an explicit marker the server is done once a round
            // brings no rows and changes nothing it would be sent back.
            let finished = finished.unwrap_or_else(|| !latest.has_results() && next == request);

            request = next;
            response = latest;

            if finished {
                state = EngineState::Completed;
            }
        }

        tracing::info!("Query ended {:?} after {} round(s)", state, rounds);
        Ok(QueryOutcome {
            state,
            response,
            request,
            rounds,
        })
    }
}
