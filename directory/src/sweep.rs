use std::time::Duration;

use tokio::sync::oneshot;

use crate::registry::PeerRegistry;

/// Handle to the background sweep task. Dropping or calling `stop` cancels
/// it at the next wake-up or iteration boundary.
pub struct SweepHandle {
    cancel: Option<oneshot::Sender<()>>,
}

impl SweepHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

pub fn spawn(registry: PeerRegistry, cleanup_interval: Duration) -> SweepHandle {
    let (cancel_tx, mut cancel_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    registry.sweep().await;
                }
                _ = &mut cancel_rx => {
                    log::info!("sweep task cancelled");
                    break;
                }
            }
        }
    });

    SweepHandle {
        cancel: Some(cancel_tx),
    }
}
