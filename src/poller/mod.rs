//! Slide-conversion completion poller.
//!
//! One detached, cancellable task per uploaded presentation. It watches the
//! object store for the conversion worker's completion marker and moves the
//! presentation's `slides_status` to its terminal value.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollConfig;
use crate::db::{self, PresentationRepository};
use crate::storage::{keys, ObjectStoreGateway};

/// How a poll loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Marker found; slide list recorded, status completed.
    Completed { slides: usize },
    /// Attempt budget exhausted; status failed.
    Exhausted,
    Cancelled,
}

/// Tracks which presentations currently have a live poller, so a second
/// trigger for the same presentation is refused instead of racing.
#[derive(Clone, Default)]
pub struct PollerRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_start(&self, presentation_id: &str) -> bool {
        self.active
            .lock()
            .unwrap()
            .insert(presentation_id.to_string())
    }

    fn finish(&self, presentation_id: &str) {
        self.active.lock().unwrap().remove(presentation_id);
    }

    pub fn is_active(&self, presentation_id: &str) -> bool {
        self.active.lock().unwrap().contains(presentation_id)
    }
}

/// Handle to a spawned poller. Dropping it does NOT stop the poll;
/// use `cancel` for that.
pub struct PollerHandle {
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<PollOutcome>>,
}

pub struct SlidePoller {
    gateway: Arc<dyn ObjectStoreGateway>,
    db_path: PathBuf,
    public_endpoint: String,
    poll: PollConfig,
}

impl SlidePoller {
    pub fn new(
        gateway: Arc<dyn ObjectStoreGateway>,
        db_path: PathBuf,
        public_endpoint: String,
        poll: PollConfig,
    ) -> Self {
        Self {
            gateway,
            db_path,
            public_endpoint,
            poll,
        }
    }

    /// Spawn a detached poll task for one presentation. Returns `None` when a
    /// poller for this presentation is already live; exactly one runs at a
    /// time per presentation.
    pub fn spawn(
        &self,
        registry: &PollerRegistry,
        user_id: &str,
        presentation_id: &str,
    ) -> Option<PollerHandle> {
        if !registry.try_start(presentation_id) {
            warn!(
                presentation_id = %presentation_id,
                "Poller already running, refusing to start another"
            );
            return None;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let gateway = Arc::clone(&self.gateway);
        let db_path = self.db_path.clone();
        let public_endpoint = self.public_endpoint.clone();
        let poll = self.poll;
        let registry = registry.clone();
        let user_id = user_id.to_string();
        let presentation_id = presentation_id.to_string();

        let task = tokio::spawn(async move {
            let result = run_poll(
                gateway,
                &db_path,
                &public_endpoint,
                poll,
                &user_id,
                &presentation_id,
                task_cancel,
            )
            .await;
            registry.finish(&presentation_id);

            if let Err(ref e) = result {
                error!(
                    presentation_id = %presentation_id,
                    "Poll loop aborted: {e:#}"
                );
            }
            result
        });

        Some(PollerHandle { cancel, task })
    }
}

async fn run_poll(
    gateway: Arc<dyn ObjectStoreGateway>,
    db_path: &PathBuf,
    public_endpoint: &str,
    poll: PollConfig,
    user_id: &str,
    presentation_id: &str,
    cancel: CancellationToken,
) -> Result<PollOutcome> {
    let marker_key = keys::completion_marker_key(user_id, presentation_id);
    let interval = Duration::from_secs(poll.interval_secs);

    for attempt in 1..=poll.max_attempts {
        if cancel.is_cancelled() {
            info!(presentation_id = %presentation_id, "Poll cancelled");
            return Ok(PollOutcome::Cancelled);
        }

        debug!(
            presentation_id = %presentation_id,
            attempt,
            max_attempts = poll.max_attempts,
            "Checking completion marker"
        );

        // Absence is "not yet"; any other storage failure aborts the loop
        // without marking the presentation failed.
        let completed = gateway
            .exists(&marker_key)
            .await
            .context("Completion marker check failed")?;

        if completed {
            let urls =
                collect_slide_urls(gateway.as_ref(), public_endpoint, user_id, presentation_id)
                    .await?;
            let slides = urls.len();

            info!(
                presentation_id = %presentation_id,
                slides,
                "Slide conversion completed"
            );

            let id = presentation_id.to_string();
            let path = db_path.clone();
            let touched = tokio::task::spawn_blocking(move || {
                let conn = db::open(&path)?;
                PresentationRepository::complete_slides(&conn, &id, &urls)
            })
            .await
            .context("Completion update task panicked")??;

            if !touched {
                warn!(
                    presentation_id = %presentation_id,
                    "Completion update touched no row (already failed or gone)"
                );
            }

            return Ok(PollOutcome::Completed { slides });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(presentation_id = %presentation_id, "Poll cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            _ = sleep(interval) => {}
        }
    }

    warn!(
        presentation_id = %presentation_id,
        attempts = poll.max_attempts,
        "Poll attempts exhausted, marking slides failed"
    );

    let id = presentation_id.to_string();
    let path = db_path.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db::open(&path)?;
        PresentationRepository::fail_slides(&conn, &id)
    })
    .await
    .context("Failure update task panicked")??;

    Ok(PollOutcome::Exhausted)
}

/// List the rendered slide images and map them to public URLs,
/// preserving the store's listing order.
async fn collect_slide_urls(
    gateway: &dyn ObjectStoreGateway,
    public_endpoint: &str,
    user_id: &str,
    presentation_id: &str,
) -> Result<Vec<String>> {
    let prefix = keys::slides_prefix(user_id, presentation_id);
    let keys = gateway
        .list(&prefix)
        .await
        .context("Failed to list slide images")?;

    Ok(keys
        .into_iter()
        .filter(|key| key.ends_with(".png"))
        .map(|key| format!("{public_endpoint}{key}"))
        .collect())
}
