//! Catalog query client library.
//!
//! Runs one general query against the catalog service, which may take
//! several request/response rounds (pagination, progress, server follow-up)
//! before the server declares it finished.
//!
//! - `models` - request/response documents and the request builder
//! - `bridge` - JSON-RPC 2.0 types for the socket protocol
//! - `ipc` - transport to the service (framing, client, `Transport` trait)
//! - `engine` - the continuation loop
//! - `progress` - progress reporting
//! - `output` - output sinks and result formatting
//! - `command` - the `query` command around the engine
//! - `signals` - SIGINT/SIGHUP/SIGTERM to cancellation
//! - `cli` - argument parsing, logging and exit codes
//!
//! # Example
//!
//! ```ignore
//! use catalog_query::command::QueryCommand;
//! use catalog_query::ipc::IpcClient;
//! use catalog_query::models::QueryParams;
//! use catalog_query::output::{ConsoleSink, StderrSink};
//! use tokio_util::sync::CancellationToken;
//!
//! let command = QueryCommand::new(QueryParams::new("select COLL_NAME, DATA_NAME"));
//! let request = command.build_request()?;
//! let client = IpcClient::connect(&socket).await?;
//! let outcome = command
//!     .run(request, client, CancellationToken::new(), &mut ConsoleSink, &mut StderrSink)
//!     .await?;
//! ```

pub mod bridge;
pub mod cli;
pub mod command;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod models;
pub mod output;
pub mod progress;
pub mod signals;
