//! Clip segmenter.
//!
//! Turns two independently-timed device streams (video and audio chunk
//! deliveries) plus control events (slide advance, recording stop) into a
//! strictly slide-ordered stream of complete clip submissions.
//!
//! The pairing rule is first-missing-wins: a device chunk always fills the
//! OLDEST placeholder still missing that device's half. Assigning to the
//! most recent placeholder instead would mis-pair chunks whenever the two
//! recorders deliver out of step with the control events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A complete, ordered clip ready for submission.
#[derive(Debug, Clone)]
pub struct ClipSubmission {
    pub slide_index: u32,
    pub clip_index: u32,
    /// Milliseconds since recording started.
    pub timestamp_ms: u64,
    pub is_end: bool,
    pub video: Vec<u8>,
    pub audio: Vec<u8>,
}

/// One not-yet-complete slide/media pairing. Lives only inside the
/// segmenter queue; consumed the moment both halves arrive.
struct PendingChunk {
    slide_index: u32,
    clip_index: u32,
    timestamp_ms: u64,
    is_end: bool,
    created: Instant,
    video: Option<Vec<u8>>,
    audio: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Device {
    Video,
    Audio,
}

/// Snapshot of the placeholder queue for stall reporting.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterHealth {
    /// Placeholders still waiting for at least one half.
    pub pending: usize,
    /// Age of the oldest incomplete placeholder.
    pub oldest_waiting: Option<Duration>,
}

impl SegmenterHealth {
    /// A device that never delivers its half blocks every later clip; past
    /// `threshold` that is a reportable fault, not a normal wait.
    pub fn stalled(&self, threshold: Duration) -> bool {
        self.oldest_waiting.map(|age| age >= threshold).unwrap_or(false)
    }
}

struct SegmenterInner {
    queue: VecDeque<PendingChunk>,
    /// Highest slide index admitted so far, across drained placeholders too.
    last_slide_index: Option<u32>,
}

/// Single-owner placeholder queue. Callbacks from either recorder and the
/// control-event source may interleave arbitrarily; one mutex is the only
/// synchronization point.
#[derive(Clone)]
pub struct ClipSegmenter {
    inner: Arc<Mutex<SegmenterInner>>,
    out: mpsc::UnboundedSender<ClipSubmission>,
}

impl ClipSegmenter {
    /// Create a segmenter and the receiving end of its ordered output.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClipSubmission>) {
        let (out, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(Mutex::new(SegmenterInner {
                    queue: VecDeque::new(),
                    last_slide_index: None,
                })),
                out,
            },
            rx,
        )
    }

    /// Control event: a cut was requested for `slide_index` (slide advanced
    /// while recording, or recording stopped with `is_end`). The placeholder
    /// waits as long as it has to for its media halves. A cut whose slide
    /// index decreases is rejected; admitting it would let the output stream
    /// go backwards.
    pub fn cut(&self, slide_index: u32, timestamp_ms: u64, is_end: bool) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(last) = inner.last_slide_index {
            if slide_index < last {
                warn!(
                    slide_index,
                    last,
                    "Cut rejected; slide indices must not decrease"
                );
                return;
            }
        }
        inner.last_slide_index = Some(slide_index);

        debug!(slide_index, is_end, "Placeholder created");
        inner.queue.push_back(PendingChunk {
            slide_index,
            // Wire format carries both; they coincide for live recordings.
            clip_index: slide_index,
            timestamp_ms,
            is_end,
            created: Instant::now(),
            video: None,
            audio: None,
        });
    }

    /// Video chunk delivery callback.
    pub fn push_video(&self, data: Vec<u8>) {
        self.fill(Device::Video, data);
    }

    /// Audio chunk delivery callback.
    pub fn push_audio(&self, data: Vec<u8>) {
        self.fill(Device::Audio, data);
    }

    pub fn health(&self) -> SegmenterHealth {
        let inner = self.inner.lock().unwrap();
        SegmenterHealth {
            pending: inner.queue.len(),
            oldest_waiting: inner.queue.front().map(|chunk| chunk.created.elapsed()),
        }
    }

    fn fill(&self, device: Device, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();

        let slot = inner.queue.iter_mut().find(|chunk| match device {
            Device::Video => chunk.video.is_none(),
            Device::Audio => chunk.audio.is_none(),
        });

        match slot {
            Some(chunk) => {
                debug!(
                    slide_index = chunk.slide_index,
                    ?device,
                    size_bytes = data.len(),
                    "Chunk paired"
                );
                match device {
                    Device::Video => chunk.video = Some(data),
                    Device::Audio => chunk.audio = Some(data),
                }
            }
            None => {
                // Chunk with no outstanding placeholder: the recorder fired
                // without a cut. Nothing to pair it with.
                warn!(?device, size_bytes = data.len(), "Unsolicited chunk dropped");
                return;
            }
        }

        // Emit from the head only. A completed placeholder behind an
        // incomplete one stays queued until everything before it resolves.
        while inner
            .queue
            .front()
            .map(|chunk| chunk.video.is_some() && chunk.audio.is_some())
            .unwrap_or(false)
        {
            let chunk = inner.queue.pop_front().unwrap();
            let submission = ClipSubmission {
                slide_index: chunk.slide_index,
                clip_index: chunk.clip_index,
                timestamp_ms: chunk.timestamp_ms,
                is_end: chunk.is_end,
                video: chunk.video.unwrap(),
                audio: chunk.audio.unwrap(),
            };
            debug!(
                slide_index = submission.slide_index,
                is_end = submission.is_end,
                "Clip complete, handing to submission queue"
            );
            if self.out.send(submission).is_err() {
                warn!("Clip receiver dropped; discarding completed clip");
            }
        }
    }
}
