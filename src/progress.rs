//! Progress reporting for long-running segmentation.
//!
//! Two kinds of progress exist:
//! - the refiner reports an approximate percentage through [`RefinementProgress`]
//! - raw gradient detection hands out each segment as soon as it is found,
//!   either through a callback or through [`RawDetectionHandle`], a bounded
//!   channel fed by a background thread
//!
//! Pacing is left to the consumer; only the order of events is meaningful.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};
use crate::strategies::fusion::detect_raw_with;
use crate::strategies::GradientFuseParams;
use crate::{ElevationPoint, Segment};

/// Trait for receiving refinement progress.
///
/// Percentages are estimates in 0-100. They may jump or repeat; only the
/// final 100 is guaranteed.
pub trait RefinementProgress: Send + Sync {
    fn on_progress(&self, percent: u8);
}

/// No-op implementation for callers that don't track progress.
pub struct NoopProgress;

impl RefinementProgress for NoopProgress {
    fn on_progress(&self, _percent: u8) {}
}

impl<F> RefinementProgress for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Atomic progress tracker that can be polled from another thread.
#[derive(Default)]
pub struct AtomicProgress {
    pub latest: AtomicU32,
    pub updates: AtomicU32,
}

impl AtomicProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> u8 {
        self.latest.load(Ordering::SeqCst) as u8
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl RefinementProgress for AtomicProgress {
    fn on_progress(&self, percent: u8) {
        self.latest.store(percent as u32, Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::SeqCst);
    }
}

/// One raw segment found during progressive detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RawSegmentEvent {
    pub segment: Segment,
    /// Number of raw segments found so far, including this one
    pub total_found: u32,
}

/// Handle to raw segment detection running on a background thread.
///
/// Segments arrive through a bounded channel, so a slow consumer throttles the
/// producer. Dropping the handle cancels detection at the next emission.
pub struct RawDetectionHandle {
    receiver: Receiver<RawSegmentEvent>,
    worker: JoinHandle<Result<Vec<Segment>>>,
}

impl RawDetectionHandle {
    /// Block until the next segment arrives. `None` once detection finished.
    pub fn recv(&self) -> Option<RawSegmentEvent> {
        self.receiver.recv().ok()
    }

    /// Wait up to `timeout` for the next segment.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<RawSegmentEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Non-blocking poll.
    pub fn try_recv(&self) -> std::result::Result<RawSegmentEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain any pending events and return the complete raw segment list.
    pub fn finish(self) -> Result<Vec<Segment>> {
        let drained = self.receiver.iter().count();
        debug!("[RawDetection] Drained {} unread segments before join", drained);
        self.worker
            .join()
            .map_err(|_| SegmentationError::Internal {
                message: "raw detection worker panicked".to_string(),
            })?
    }
}

impl Iterator for RawDetectionHandle {
    type Item = RawSegmentEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Start raw gradient detection in a background thread.
///
/// `capacity` bounds the number of segments buffered ahead of the consumer
/// (0 makes every emission a rendezvous).
pub fn spawn_raw_detection(
    points: Vec<ElevationPoint>,
    params: GradientFuseParams,
    capacity: usize,
) -> RawDetectionHandle {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let points: Arc<[ElevationPoint]> = points.into();

    let worker = thread::spawn(move || {
        let mut emitted = 0usize;
        let mut cancelled = false;
        let segments = detect_raw_with(&points, &params, |segment, total| {
            let event = RawSegmentEvent {
                segment: segment.clone(),
                total_found: total as u32,
            };
            if tx.send(event).is_err() {
                cancelled = true;
                return ControlFlow::Break(());
            }
            emitted += 1;
            ControlFlow::Continue(())
        });

        if cancelled {
            warn!("[RawDetection] Consumer went away after {} segments", emitted);
            return Err(SegmentationError::Cancelled { emitted });
        }
        Ok(segments)
    });

    RawDetectionHandle {
        receiver: rx,
        worker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::is_contiguous;
    use crate::strategies::fusion::detect_raw;

    fn terraced(n: usize) -> Vec<ElevationPoint> {
        // Alternating 400m steep and 400m gentle stretches, 20m spacing
        (0..n)
            .map(|i| {
                let d = i as f64 * 0.02;
                let block = (d / 0.4).floor();
                let within = d - block * 0.4;
                let base = block * 0.4 * 70.0;
                let e = if block as i64 % 2 == 0 {
                    base + within * 120.0
                } else {
                    base + within * 20.0
                };
                ElevationPoint::new(d, 300.0 + e)
            })
            .collect()
    }

    #[test]
    fn test_closure_progress() {
        let seen = std::sync::Mutex::new(Vec::new());
        let callback = |p: u8| seen.lock().unwrap().push(p);
        callback.on_progress(10);
        callback.on_progress(100);
        assert_eq!(*seen.lock().unwrap(), vec![10, 100]);
    }

    #[test]
    fn test_atomic_progress() {
        let tracker = AtomicProgress::new();
        tracker.on_progress(42);
        tracker.on_progress(100);
        assert_eq!(tracker.latest(), 100);
        assert_eq!(tracker.updates(), 2);
        NoopProgress.on_progress(5);
    }

    #[test]
    fn test_background_detection_matches_sync() {
        let points = terraced(200);
        let params = GradientFuseParams::default();
        let expected = detect_raw(&points, &params, |_, _| {});

        let handle = spawn_raw_detection(points.clone(), params, 2);
        let events: Vec<RawSegmentEvent> = handle.collect();

        assert_eq!(events.len(), expected.len());
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.total_found as usize, i + 1);
            assert_eq!(event.segment, expected[i]);
        }
    }

    #[test]
    fn test_finish_returns_full_list() {
        let points = terraced(200);
        let handle = spawn_raw_detection(points.clone(), GradientFuseParams::default(), 1);
        let first = handle.recv();
        assert!(first.is_some());

        let segments = handle.finish().unwrap();
        assert!(is_contiguous(&segments, points.len()));
    }

    #[test]
    fn test_dropping_receiver_cancels_worker() {
        let points = terraced(400);
        let handle = spawn_raw_detection(points, GradientFuseParams::default(), 0);
        let first = handle.recv_timeout(Duration::from_secs(5));
        assert!(first.is_ok());

        let RawDetectionHandle { receiver, worker } = handle;
        drop(receiver);
        assert!(matches!(
            worker.join().unwrap(),
            Err(SegmentationError::Cancelled { .. })
        ));
    }
}
