//! Presentation domain model.
//!
//! Records, clips, and the lifecycle state machine that gates which
//! operations are valid at any point in the pipeline.

pub mod model;
pub mod status;

pub use model::{Clip, ClipFeedback, Presentation, Preset};
pub use status::{InvalidTransition, PresentationStatus, SlidesStatus};
