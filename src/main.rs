//! catalog-query - run a general query against the catalog service.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use catalog_query::cli::{exit_code, init_logging, Cli};
use catalog_query::output::StderrSink;
use catalog_query::signals;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::info!("Starting catalog-query v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let listener = match signals::install(cancel.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Could not install signal handlers: {}", e);
            None
        }
    };

    let result = cli.execute(cancel).await;

    if let Some(handle) = listener {
        handle.abort();
    }

    exit_code(&result, &mut StderrSink)
}
