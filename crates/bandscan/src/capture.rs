//! Capture-to-processing queue
//!
//! Blocking device reads and DSP math run on separate threads joined
//! by a bounded queue of sample blocks, so a stalled USB transfer
//! never blocks computation and a slow FFT never stalls the tuner.
//!
//! Backpressure policy: when the queue is full the capture thread
//! drops the *oldest* unread block and counts a buffer overrun.
//! Bounded staleness beats unbounded latency in a live monitoring
//! tool, so the newest samples always win. The overrun counter is an
//! observable metric, not an error.

#[cfg(not(test))]
use log::{error, warn};

#[cfg(test)]
use std::println as error;
#[cfg(test)]
use std::println as warn;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, TrySendError};

use crate::block::SampleBlock;
use crate::source::{HardwareError, SampleSource, TunerStatus};

/// Control handle for a running capture thread
///
/// Dropping the handle stops the capture and joins the thread.
#[derive(Debug)]
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
    status: TunerStatus,
    error: Arc<Mutex<Option<HardwareError>>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Number of blocks dropped because the queue was full
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Tuner state snapshot taken when the capture started
    ///
    /// Never blocks on an in-flight read.
    pub fn status(&self) -> TunerStatus {
        self.status
    }

    /// The hardware error that ended the capture, if any
    pub fn take_error(&self) -> Option<HardwareError> {
        self.error.lock().expect("capture error slot").take()
    }

    /// Signal the capture thread to stop and wait for it
    ///
    /// The device handle is released before this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start a capture thread feeding a bounded block queue
///
/// Reads blocks of `block_len` samples from `source` until stopped,
/// the consumer goes away, or the device fails. At most `depth`
/// blocks are queued; see the module docs for the overrun policy.
/// A [`HardwareError`] ends the capture cleanly: the device handle is
/// released, the queue disconnects, and the error is available from
/// [`CaptureHandle::take_error`].
pub fn spawn_capture<S>(
    mut source: S,
    block_len: usize,
    depth: usize,
) -> (Receiver<SampleBlock>, CaptureHandle)
where
    S: SampleSource + Send + 'static,
{
    assert!(block_len > 0 && depth > 0);

    let stop = Arc::new(AtomicBool::new(false));
    let overruns = Arc::new(AtomicU64::new(0));
    let error = Arc::new(Mutex::new(None));
    let status = source.status();

    let (tx, rx) = bounded(depth);
    let drain = rx.clone();

    let thread = {
        let stop = Arc::clone(&stop);
        let overruns = Arc::clone(&overruns);
        let error = Arc::clone(&error);
        std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let block = match source.read_samples(block_len) {
                    Ok(block) => block,
                    Err(err) => {
                        error!("capture read failed: {}", err);
                        *error.lock().expect("capture error slot") = Some(err);
                        break;
                    }
                };

                let mut pending = block;
                loop {
                    match tx.try_send(pending) {
                        Ok(()) => break,
                        Err(TrySendError::Full(back)) => {
                            // favor freshness: age out the oldest block
                            let _ = drain.try_recv();
                            overruns.fetch_add(1, Ordering::Relaxed);
                            pending = back;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            source.close();
                            return;
                        }
                    }
                }
            }
            source.close();
        })
    };

    (
        rx,
        CaptureHandle {
            stop,
            overruns,
            status,
            error,
            thread: Some(thread),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use num_complex::Complex;

    use crate::source::Gain;

    // yields `limit` blocks tagged by sequence number, then fails
    struct ScriptedSource {
        reads: u64,
        limit: u64,
    }

    impl SampleSource for ScriptedSource {
        fn set_frequency(&mut self, _hz: u64) -> Result<(), HardwareError> {
            Ok(())
        }

        fn set_gain(&mut self, _gain: Gain) -> Result<(), HardwareError> {
            Ok(())
        }

        fn read_samples(&mut self, count: usize) -> Result<SampleBlock, HardwareError> {
            if self.reads >= self.limit {
                return Err(HardwareError::Disconnected);
            }
            let tag = self.reads;
            self.reads += 1;
            Ok(SampleBlock::new(
                vec![Complex::new(0.0, 0.0); count],
                2_048_000,
                tag,
            ))
        }

        fn status(&self) -> TunerStatus {
            TunerStatus {
                connected: true,
                frequency: 100_000_000,
                sample_rate: 2_048_000,
                gain: Gain::Auto,
            }
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_overrun_drops_oldest() {
        let source = ScriptedSource { reads: 0, limit: 10 };
        let (rx, handle) = spawn_capture(source, 64, 2);

        // wait for the scripted device failure before reading anything,
        // so every block has been produced into the depth-2 queue
        let err = loop {
            match handle.take_error() {
                Some(err) => break err,
                None => std::thread::yield_now(),
            }
        };
        assert_eq!(HardwareError::Disconnected, err);

        // the two newest blocks survived; everything older aged out
        let received: Vec<u64> = rx.try_iter().map(|b| b.center_freq()).collect();
        assert_eq!(vec![8, 9], received);
        assert_eq!(8, handle.overruns());
    }

    #[test]
    fn test_status_snapshot_is_nonblocking() {
        let source = ScriptedSource { reads: 0, limit: 1 };
        let (_rx, handle) = spawn_capture(source, 64, 4);
        let status = handle.status();
        assert!(status.connected);
        assert_eq!(2_048_000, status.sample_rate);
        handle.stop();
    }

    #[test]
    fn test_stop_releases_promptly() {
        let source = ScriptedSource {
            reads: 0,
            limit: u64::MAX,
        };
        let (rx, handle) = spawn_capture(source, 64, 2);
        let _ = rx.recv().unwrap();
        handle.stop();
        // producer is gone; the channel drains and disconnects
        while rx.recv().is_ok() {}
    }
}
