//! Translate termination signals into query cancellation.
//!
//! SIGINT, SIGHUP and SIGTERM all cancel the same token. The token is never
//! reset; a second signal is a no-op.

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a task that cancels `token` on the first termination signal.
///
/// Must be called from within a tokio runtime. The task exits once the
/// token is cancelled, whether by a signal or by the caller.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be registered.
pub fn install(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = hangup.recv() => "SIGHUP",
            _ = terminate.recv() => "SIGTERM",
            _ = token.cancelled() => return,
        };

        tracing::info!("Received {}, cancelling after the current round", name);
        token.cancel();
    }))
}
