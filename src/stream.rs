//! Raw segment detection as an async stream.
//!
//! Detection runs in a tokio task and yields to the runtime after every
//! segment, so a UI task sharing the runtime can render each one as it
//! arrives. Dropping the stream stops the task at its next emission.

use futures::stream::{self, Stream};
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::progress::RawSegmentEvent;
use crate::strategies::fusion::RawSegments;
use crate::strategies::GradientFuseParams;
use crate::ElevationPoint;

/// Start raw detection on the current tokio runtime and stream its segments.
///
/// `capacity` bounds the number of segments buffered ahead of the consumer
/// (at least 1). Must be called from within a tokio runtime.
pub fn raw_segment_stream(
    points: Vec<ElevationPoint>,
    params: GradientFuseParams,
    capacity: usize,
) -> impl Stream<Item = RawSegmentEvent> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut total_found = 0u32;
        for segment in RawSegments::new(&points, &params) {
            total_found += 1;
            let event = RawSegmentEvent {
                segment,
                total_found,
            };
            if tx.send(event).await.is_err() {
                warn!(
                    "[RawStream] Stream dropped after {} segments",
                    total_found - 1
                );
                return;
            }
            tokio::task::yield_now().await;
        }
        debug!("[RawStream] Finished with {} segments", total_found);
    });

    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event, rx))
    })
}
