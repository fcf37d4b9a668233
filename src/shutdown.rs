use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Returns a token that is cancelled on SIGTERM or SIGINT.
///
/// The server stops accepting new requests once the token fires; renders
/// already in flight run to completion before the process exits.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, draining in-flight renders");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, draining in-flight renders");
            }
        }

        signal_token.cancel();
    });

    token
}
