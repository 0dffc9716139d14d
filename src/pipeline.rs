//! Per-object frame pipelines.
//!
//! Once detection returns, each object gets its own thread that extracts the
//! frame at the object's timestamp and draws its box. Threads are never
//! joined or cancelled; they report over a channel and the session decides
//! whether the result is still current.

use anyhow::{anyhow, Result};
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::annotate::annotate;
use crate::ingest::extract_rgb;
use crate::jpeg;
use crate::model::{BoundingBox, DetectedObject};
use crate::session::{FrameUpdate, Session};

/// Long-lived channel shared by every run of a session.
pub struct FramePipeline {
    quality: u8,
    sender: Sender<FrameUpdate>,
    receiver: Receiver<FrameUpdate>,
    /// Jobs launched whose update has not been received yet, any run.
    in_flight: Cell<usize>,
}

impl FramePipeline {
    pub fn new(quality: u8) -> Self {
        let (sender, receiver) = channel();
        Self {
            quality,
            sender,
            receiver,
            in_flight: Cell::new(0),
        }
    }

    /// Start one extract → annotate job per object of run `generation`.
    pub fn launch(&self, video: &Path, generation: u64, objects: &[DetectedObject]) {
        for (index, object) in objects.iter().enumerate() {
            self.launch_one(video, generation, index, object);
        }
    }

    /// Start the job for display slot `index`.
    pub fn launch_one(&self, video: &Path, generation: u64, index: usize, object: &DetectedObject) {
        let sender = self.sender.clone();
        let video = video.to_path_buf();
        let name = object.name.clone();
        let timestamp = object.timestamp;
        let bbox = object.bounding_box;
        let quality = self.quality;
        self.in_flight.set(self.in_flight.get() + 1);
        std::thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                render_frame(&video, timestamp, &bbox, quality)
            }))
            .unwrap_or_else(|_| Err(anyhow!("frame job panicked")));
            // The receiver only goes away with the session.
            let _ = sender.send(FrameUpdate {
                generation,
                index,
                name,
                result,
            });
        });
    }

    /// Block until every job of the session's current run has reported,
    /// calling `on_settled` after each current-run update. Returns at once
    /// when no job is in flight, even if slots are still pending.
    pub fn wait(&self, session: &mut Session, mut on_settled: impl FnMut(&FrameProgress)) {
        while session.pending() > 0 && self.in_flight.get() > 0 {
            let Ok(update) = self.receiver.recv() else {
                break;
            };
            self.in_flight.set(self.in_flight.get().saturating_sub(1));
            let generation = update.generation;
            let index = update.index;
            let stored = session.apply(update);
            if generation == session.generation() {
                on_settled(&FrameProgress { index, stored });
            }
        }
    }

    /// Apply whatever has arrived without blocking. Returns the number of
    /// images stored.
    pub fn poll(&self, session: &mut Session) -> usize {
        let mut stored = 0;
        while let Ok(update) = self.receiver.try_recv() {
            self.in_flight.set(self.in_flight.get().saturating_sub(1));
            if session.apply(update) {
                stored += 1;
            }
        }
        stored
    }
}

/// Settled slot reported to progress callbacks.
#[derive(Clone, Copy, Debug)]
pub struct FrameProgress {
    pub index: usize,
    pub stored: bool,
}

/// Extract the frame at `timestamp` and draw `bbox` on it.
pub fn render_frame(
    video: &Path,
    timestamp: f64,
    bbox: &BoundingBox,
    quality: u8,
) -> Result<Vec<u8>> {
    let frame = extract_rgb(video, timestamp)?;
    jpeg::encode(&annotate(&frame, bbox), quality)
}
