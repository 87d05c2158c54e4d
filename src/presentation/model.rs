//! Presentation and clip records.

use serde::{Deserialize, Serialize};

use super::status::{PresentationStatus, SlidesStatus};

/// Free-text preset the user supplies when creating a presentation.
/// Consumed downstream by the feedback analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preset {
    #[serde(rename = "presentationDescription")]
    pub presentation_description: String,
    #[serde(rename = "audienceDescription")]
    pub audience_description: String,
    #[serde(rename = "toneDescription")]
    pub tone_description: String,
}

/// Per-clip feedback written by the downstream analysis worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipFeedback {
    pub emotion: Vec<String>,
    #[serde(rename = "emotionScore")]
    pub emotion_score: f64,
    pub text: String,
}

/// One slide's recorded video+audio segment. Keyed by slide index;
/// resubmitting the same index overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    #[serde(rename = "slideIndex")]
    pub slide_index: u32,
    #[serde(rename = "videoKey")]
    pub video_key: String,
    #[serde(rename = "audioKey")]
    pub audio_key: String,
    pub feedback: Option<ClipFeedback>,
}

/// A presentation record as stored and served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "pdfKey")]
    pub pdf_key: String,
    pub preset: Preset,
    #[serde(rename = "slidesStatus")]
    pub slides_status: SlidesStatus,
    /// Public slide image URLs, in storage listing order.
    /// Non-empty exactly when `slides_status` is completed.
    pub slides: Vec<String>,
    #[serde(rename = "presentationStatus")]
    pub presentation_status: PresentationStatus,
    pub clips: Vec<Clip>,
}

impl Presentation {
    pub fn new(id: String, name: String, user_id: String, pdf_key: String, preset: Preset) -> Self {
        Self {
            id,
            name,
            user_id,
            created_at: chrono::Utc::now(),
            pdf_key,
            preset,
            slides_status: SlidesStatus::Pending,
            slides: Vec::new(),
            presentation_status: PresentationStatus::Pending,
            clips: Vec::new(),
        }
    }
}
