//! Ctrl+C handling.
//!
//! The first Ctrl+C cancels the shared token so the running harvest or fork
//! sweep stops at its next wait and still writes what it has. A second
//! Ctrl+C exits immediately with status 130.

use std::thread;

use haulout_sync::CancelToken;

/// Spawn a watcher thread that cancels `token` on Ctrl+C.
///
/// Failure to install the handler is logged and otherwise ignored; the run
/// just cannot be interrupted gracefully.
pub fn install(token: CancelToken) {
    let spawned = thread::Builder::new()
        .name("haulout-ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::warn!(error = %err, "could not start signal runtime");
                    return;
                }
            };
            runtime.block_on(watch(token));
        });

    if let Err(err) = spawned {
        tracing::warn!(error = %err, "could not spawn Ctrl+C watcher");
    }
}

async fn watch(token: CancelToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    eprintln!("\nStopping after the current request; press Ctrl+C again to quit now.");
    token.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Force quit.");
        std::process::exit(130);
    }
}
