//! HTTP clip sink.
//!
//! Submits a completed clip to the backend clip endpoint as the multipart
//! form the server expects. One call, no retries; the submission queue owns
//! retry policy (which is: report, never retry).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use super::segmenter::ClipSubmission;
use super::submit_queue::ClipSink;
use crate::config::RecorderConfig;

pub struct HttpClipSink {
    client: reqwest::Client,
    base_url: String,
    presentation_id: String,
}

impl HttpClipSink {
    /// `base_url` is the API root, e.g. `http://localhost:3001`.
    /// `upload_timeout` of None leaves timeouts to the transport.
    pub fn new(
        base_url: &str,
        presentation_id: &str,
        upload_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = upload_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            presentation_id: presentation_id.to_string(),
        })
    }

    pub fn from_config(
        config: &RecorderConfig,
        base_url: &str,
        presentation_id: &str,
    ) -> Result<Self> {
        Self::new(
            base_url,
            presentation_id,
            config.upload_timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl ClipSink for HttpClipSink {
    async fn submit(&self, submission: &ClipSubmission) -> Result<()> {
        let form = Form::new()
            .text("slideIndex", submission.slide_index.to_string())
            .text("clipIndex", submission.clip_index.to_string())
            .text("clipTimestamp", submission.timestamp_ms.to_string())
            .text("isEnd", submission.is_end.to_string())
            .part(
                "videoFile",
                Part::bytes(submission.video.clone())
                    .file_name("video.webm")
                    .mime_str("video/webm")?,
            )
            .part(
                "audioFile",
                Part::bytes(submission.audio.clone())
                    .file_name("audio.webm")
                    .mime_str("audio/webm")?,
            );

        let url = format!(
            "{}/presentations/{}/clip",
            self.base_url, self.presentation_id
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Clip submission request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Clip submission rejected ({status}): {body}");
        }

        Ok(())
    }
}
