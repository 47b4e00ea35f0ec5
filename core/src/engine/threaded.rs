use crate::engine::source::ScanSource;
use crate::scan::ScanBatch;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const CHANNEL_DEPTH: usize = 4;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a batch producer on a background thread and exposes it as a
/// blocking [`ScanSource`].
///
/// Liveness is shared with the producer thread through an atomic flag; the
/// engine only ever reads it.
pub struct ThreadedSource {
    receiver: Receiver<ScanBatch>,
    running: Arc<AtomicBool>,
    started: Instant,
    run_for: Option<Duration>,
    exhausted: bool,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedSource {
    /// `producer` returns `None` when it has nothing more to deliver.
    ///
    /// The producer runs ahead of the engine, so it must capture its scan
    /// resolution here; the value passed to `read_batch` is not forwarded.
    pub fn spawn<F>(run_for: Option<Duration>, mut producer: F) -> Self
    where
        F: FnMut() -> Option<ScanBatch> + Send + 'static,
    {
        let (sender, receiver) = bounded(CHANNEL_DEPTH);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::spawn(move || {
            while flag.load(Ordering::Acquire) {
                let Some(batch) = producer() else {
                    debug!("scan producer exhausted");
                    break;
                };
                let mut pending = batch;
                loop {
                    match sender.send_timeout(pending, POLL_INTERVAL) {
                        Ok(()) => break,
                        Err(crossbeam_channel::SendTimeoutError::Timeout(batch)) => {
                            if !flag.load(Ordering::Acquire) {
                                return;
                            }
                            pending = batch;
                        }
                        Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
        });

        Self {
            receiver,
            running,
            started: Instant::now(),
            run_for,
            exhausted: false,
            handle: Some(handle),
        }
    }

    fn within_run_time(&self) -> bool {
        self.run_for
            .map_or(true, |limit| self.started.elapsed() < limit)
    }
}

impl ScanSource for ThreadedSource {
    /// Resolution is fixed by the producer given to [`ThreadedSource::spawn`].
    fn read_batch(&mut self, _scan_resolution: f64) -> ScanBatch {
        loop {
            if self.exhausted || !self.healthy() {
                return ScanBatch::end_of_stream();
            }
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(batch) => return batch,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.exhausted = true;
                }
            }
        }
    }

    fn healthy(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.within_run_time()
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("scan producer thread panicked");
            }
        }
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.stop();
    }
}
