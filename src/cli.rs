//! Command-line surface.
//!
//! ```text
//! catalog-query [options] "general query string"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::QueryCommand;
use crate::engine::{EngineConfig, QueryOutcome};
use crate::error::QueryError;
use crate::ipc::{default_socket_path, IpcClient, DEFAULT_TIMEOUT_SECS};
use crate::models::QueryParams;
use crate::output::{ConsoleSink, OutputSink, StderrSink};

/// Perform a general query against the catalog.
#[derive(Debug, Parser)]
#[command(name = "catalog-query", version, about)]
pub struct Cli {
    /// The query, using the general query syntax.
    pub query: Option<String>,

    /// Row template: %1%, %2%, ... by position, or %s in order.
    #[arg(long)]
    pub format: Option<String>,

    /// Limit the number of query results.
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Offset of query results.
    #[arg(long, allow_negative_numbers = true)]
    pub offset: Option<i64>,

    /// Page size for potentially large queries.
    #[arg(long = "page_size", allow_negative_numbers = true)]
    pub page_size: Option<i64>,

    /// Request progress as a percentage.
    #[arg(long)]
    pub progress: bool,

    /// Path to the catalog service socket.
    #[arg(long, env = "CATALOG_QUERY_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Seconds to wait for each round's response (at least 1).
    #[arg(
        long,
        env = "CATALOG_QUERY_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub connect_retries: u32,

    /// Abort if the server has not finished after this many rounds.
    #[arg(long, env = "CATALOG_QUERY_MAX_ROUNDS")]
    pub max_rounds: Option<u32>,

    /// Log round-level detail to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn command(&self) -> QueryCommand {
        let params = QueryParams {
            query: self.query.clone(),
            limit: self.limit,
            offset: self.offset,
            page_size: self.page_size,
            progress: self.progress,
        };

        QueryCommand {
            params,
            format: self.format.clone(),
            engine: EngineConfig {
                max_rounds: self.max_rounds,
            },
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(default_socket_path)
    }

    /// Validate, connect and run the query.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<QueryOutcome, QueryError> {
        let command = self.command();
        let request = command.build_request()?;

        let socket = self.socket_path();
        let mut client = IpcClient::connect_with_retry(&socket, self.connect_retries).await?;
        client.set_timeout(Duration::from_secs(self.timeout));

        command
            .run(request, client, cancel, &mut ConsoleSink, &mut StderrSink)
            .await
    }
}

/// Initialise logging to stderr. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "catalog_query=debug"
    } else {
        "catalog_query=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Map a finished query to the process exit code.
///
/// Completed and cancelled queries both exit 0. A failure is reported once,
/// as a single `Error: ...` line on `err_out`.
pub fn exit_code(
    result: &Result<QueryOutcome, QueryError>,
    err_out: &mut dyn OutputSink,
) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            err_out.accept(&format!("Error: {}", e));
            ExitCode::from(e.exit_code())
        }
    }
}
