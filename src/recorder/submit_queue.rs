//! Clip submission queue.
//!
//! Serializes clip uploads for one presentation: strict FIFO, exactly one
//! submission in flight, one attempt per submission. A failed submission
//! blocks everything behind it until a replacement for the same slide index
//! is enqueued; ordering takes precedence over throughput.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::segmenter::ClipSubmission;

/// Destination for completed clips: the backend clip endpoint in
/// production, an in-process fake in tests.
#[async_trait]
pub trait ClipSink: Send + Sync {
    async fn submit(&self, submission: &ClipSubmission) -> Result<()>;
}

/// The submission that failed and is holding up the queue.
#[derive(Debug, Clone)]
pub struct BlockedClip {
    pub slide_index: u32,
    pub error: String,
}

/// Observable queue state; `blocked` is the stuck-queue health signal the
/// surrounding app must surface.
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub depth: usize,
    pub in_flight: Option<u32>,
    pub blocked: Option<BlockedClip>,
    pub submitted: u32,
    pub terminal_submitted: bool,
}

struct QueueState {
    queue: VecDeque<ClipSubmission>,
    in_flight: Option<u32>,
    blocked: Option<(ClipSubmission, String)>,
    submitted: u32,
    terminal_submitted: bool,
}

pub struct ClipSubmitQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    worker: JoinHandle<()>,
}

impl ClipSubmitQueue {
    pub fn new(sink: Arc<dyn ClipSink>) -> Self {
        let state = Arc::new(Mutex::new(QueueState {
            queue: VecDeque::new(),
            in_flight: None,
            blocked: None,
            submitted: 0,
            terminal_submitted: false,
        }));
        let notify = Arc::new(Notify::new());

        let worker = tokio::spawn(run_worker(
            Arc::clone(&state),
            Arc::clone(&notify),
            sink,
        ));

        Self {
            state,
            notify,
            worker,
        }
    }

    /// Queue a completed clip. If the queue is blocked on a failure for the
    /// same slide index, this replaces the failed submission and resumes.
    pub async fn enqueue(&self, submission: ClipSubmission) {
        let mut state = self.state.lock().await;

        if let Some((blocked, _)) = &state.blocked {
            if blocked.slide_index == submission.slide_index {
                info!(
                    slide_index = submission.slide_index,
                    "Replacing blocked submission, resuming queue"
                );
                state.blocked = None;
                state.queue.push_front(submission);
                drop(state);
                self.notify.notify_one();
                return;
            }
        }

        state.queue.push_back(submission);
        drop(state);
        self.notify.notify_one();
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        QueueStatus {
            depth: state.queue.len(),
            in_flight: state.in_flight,
            blocked: state
                .blocked
                .as_ref()
                .map(|(submission, error)| BlockedClip {
                    slide_index: submission.slide_index,
                    error: error.clone(),
                }),
            submitted: state.submitted,
            terminal_submitted: state.terminal_submitted,
        }
    }
}

impl Drop for ClipSubmitQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    sink: Arc<dyn ClipSink>,
) {
    loop {
        let notified = notify.notified();

        let next = {
            let mut state = state.lock().await;
            if state.blocked.is_some() {
                None
            } else {
                let submission = state.queue.pop_front();
                state.in_flight = submission.as_ref().map(|s| s.slide_index);
                submission
            }
        };

        let Some(submission) = next else {
            notified.await;
            continue;
        };

        let result = sink.submit(&submission).await;

        let mut state = state.lock().await;
        state.in_flight = None;
        match result {
            Ok(()) => {
                state.submitted += 1;
                if submission.is_end {
                    state.terminal_submitted = true;
                    info!(slide_index = submission.slide_index, "Terminal clip submitted");
                }
            }
            Err(e) => {
                error!(
                    slide_index = submission.slide_index,
                    "Clip submission failed, queue blocked: {e:#}"
                );
                if !state.queue.is_empty() {
                    warn!(
                        behind = state.queue.len(),
                        "Later clips held back until the failed slide is resolved"
                    );
                }
                state.blocked = Some((submission, format!("{e:#}")));
            }
        }
    }
}
