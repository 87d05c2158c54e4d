//! Recording-side clip pipeline.
//!
//! The segmenter pairs chunks from the two recording devices into
//! slide-ordered clips; the submission queue uploads them one at a time
//! through a `ClipSink`.

pub mod clip_sink;
pub mod segmenter;
pub mod submit_queue;

pub use clip_sink::HttpClipSink;
pub use segmenter::{ClipSegmenter, ClipSubmission, SegmenterHealth};
pub use submit_queue::{BlockedClip, ClipSink, ClipSubmitQueue, QueueStatus};
