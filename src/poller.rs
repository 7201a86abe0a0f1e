use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::engine::Shared;

/// Background thread that re-reads the retrievers every `interval`.
///
/// Dropping the stop sender wakes the thread immediately; [Poller::stop] then joins it.
pub(crate) struct Poller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub(crate) fn start(shared: Arc<Shared>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("typed-flags-poller".to_string())
            .spawn(move || {
                debug!("flag poller started, interval {:?}", interval);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = shared.refresh() {
                                error!("background flag refresh failed: {}", e);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("flag poller stopped");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("could not start flag poller, flags will only refresh on demand: {}", e);
                None
            }
        };

        Poller {
            stop: Some(stop_tx),
            handle,
        }
    }

    pub(crate) fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("flag poller panicked");
            } else {
                info!("flag poller joined");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
