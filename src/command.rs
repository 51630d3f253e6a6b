//! The `query` command.
//!
//! Wraps the continuation engine with what a user sees around it: the
//! request is validated before anything touches the network, and after the
//! loop the cancellation notice and any server-reported errors are printed.

use tokio_util::sync::CancellationToken;

use crate::engine::{ContinuationEngine, EngineConfig, QueryOutcome};
use crate::error::QueryError;
use crate::ipc::Transport;
use crate::models::{QueryParams, Request};
use crate::output::{OutputSink, ResultFormatter};
use crate::progress::{NoProgress, PercentProgress, ProgressReporter};

/// Printed when the user interrupted the query.
pub const CANCELLED_NOTICE: &str = "Operation Cancelled.";

#[derive(Debug, Clone, Default)]
pub struct QueryCommand {
    pub params: QueryParams,
    /// Row template; `None` prints raw JSON.
    pub format: Option<String>,
    pub engine: EngineConfig,
}

impl QueryCommand {
    pub fn new(params: QueryParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validate parameters and build the first request. Call this before
    /// connecting so a missing query never reaches the network.
    pub fn build_request(&self) -> Result<Request, QueryError> {
        Request::build(&self.params)
    }

    /// Run the query over `transport`.
    ///
    /// Rows go to `out` as they arrive; progress (if requested) goes to
    /// `progress_out`. After the loop, `out` receives the cancellation
    /// notice, if any, followed by each server-reported error.
    ///
    /// # Errors
    ///
    /// Only transport failures. Server-reported errors and formatting
    /// problems are printed, not returned.
    pub async fn run<T: Transport>(
        &self,
        request: Request,
        transport: T,
        cancel: CancellationToken,
        out: &mut dyn OutputSink,
        progress_out: &mut dyn OutputSink,
    ) -> Result<QueryOutcome, QueryError> {
        let formatter = ResultFormatter::from_option(self.format.as_deref());
        let mut reporter: Box<dyn ProgressReporter + '_> = if self.params.progress {
            Box::new(PercentProgress::new(progress_out))
        } else {
            Box::new(NoProgress)
        };

        let mut engine = ContinuationEngine::new(transport, cancel).with_config(self.engine.clone());
        let outcome = engine
            .run(request, reporter.as_mut(), &formatter, out)
            .await?;

        if outcome.is_cancelled() {
            out.accept(CANCELLED_NOTICE);
        }

        let errors = outcome.response.errors();
        if !errors.is_empty() {
            tracing::info!("Server reported {} error(s)", errors.len());
        }
        for error in errors {
            out.accept(&error.to_string());
        }

        Ok(outcome)
    }

    /// [`build_request`](Self::build_request) followed by [`run`](Self::run).
    pub async fn execute<T: Transport>(
        &self,
        transport: T,
        cancel: CancellationToken,
        out: &mut dyn OutputSink,
        progress_out: &mut dyn OutputSink,
    ) -> Result<QueryOutcome, QueryError> {
        let request = self.build_request()?;
        self.run(request, transport, cancel, out, progress_out).await
    }
}
