//! Interrupt plumbing: OS signals cancel a token, and cancellation is handed
//! to the event loop as a single notification.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Cancel `cancel` on Ctrl-C (and SIGTERM on unix). Must be called from
/// within a tokio runtime. The watchers finish once `cancel` fires.
pub fn spawn_signal_watchers(cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
    let mut watchers = Vec::with_capacity(2);
    {
        let cancel = cancel.clone();
        watchers.push(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("ctrl-c received; initiating shutdown");
                        cancel.cancel();
                    }
                    Err(err) => warn!("ctrl-c handler failed: {err}"),
                },
            }
        }));
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        watchers.push(tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        received = sigterm.recv() => {
                            if received.is_some() {
                                info!("SIGTERM received; initiating shutdown");
                                cancel.cancel();
                            }
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        }));
    }

    watchers
}

/// Run `notify` once `cancel` fires.
pub fn forward_cancellation<F>(cancel: CancellationToken, notify: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        cancel.cancelled().await;
        notify();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_exactly_on_cancel() {
        let cancel = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let handle = {
            let fired = Arc::clone(&fired);
            forward_cancellation(cancel.clone(), move || fired.store(true, Ordering::SeqCst))
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!fired.load(Ordering::SeqCst));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("forwarder finished")
            .expect("forwarder did not panic");
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn watchers_exit_when_cancelled_elsewhere() {
        let cancel = CancellationToken::new();
        let watchers = spawn_signal_watchers(&cancel);
        assert!(!watchers.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(watchers.iter().all(|w| !w.is_finished()));

        cancel.cancel();
        for watcher in watchers {
            tokio::time::timeout(Duration::from_secs(1), watcher)
                .await
                .expect("watcher finished after cancel")
                .expect("watcher did not panic");
        }
    }
}
