//! Presentation lifecycle statuses and their legal transitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of the slide conversion job for a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlidesStatus {
    Pending,
    Completed,
    Failed,
}

/// Status of the recording/feedback pipeline for a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationStatus {
    Pending,
    Processing,
    Complete,
}

/// A status change that the state machine does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl SlidesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Validate a transition. `Completed` and `Failed` are terminal;
    /// re-applying `Completed` is allowed so completion handling stays
    /// idempotent (last-write-wins on the slide list).
    pub fn transition(self, to: SlidesStatus) -> Result<SlidesStatus, InvalidTransition> {
        match (self, to) {
            (Self::Pending, Self::Completed)
            | (Self::Pending, Self::Failed)
            | (Self::Completed, Self::Completed) => Ok(to),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl PresentationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Validate a transition. `Complete` is terminal and nothing moves
    /// backwards; the attempt is rejected, never silently reapplied.
    pub fn transition(self, to: PresentationStatus) -> Result<PresentationStatus, InvalidTransition> {
        match (self, to) {
            (Self::Pending, Self::Processing) | (Self::Processing, Self::Complete) => Ok(to),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slides_status_as_str() {
        assert_eq!(SlidesStatus::Pending.as_str(), "pending");
        assert_eq!(SlidesStatus::Completed.as_str(), "completed");
        assert_eq!(SlidesStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_slides_status_roundtrip() {
        for status in [SlidesStatus::Pending, SlidesStatus::Completed, SlidesStatus::Failed] {
            assert_eq!(SlidesStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SlidesStatus::parse("bogus"), None);
    }

    #[test]
    fn test_slides_status_serialization() {
        let json = serde_json::to_string(&SlidesStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let parsed: SlidesStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, SlidesStatus::Failed);
    }

    #[test]
    fn test_slides_status_legal_transitions() {
        assert_eq!(
            SlidesStatus::Pending.transition(SlidesStatus::Completed),
            Ok(SlidesStatus::Completed)
        );
        assert_eq!(
            SlidesStatus::Pending.transition(SlidesStatus::Failed),
            Ok(SlidesStatus::Failed)
        );
        // Idempotent re-completion
        assert_eq!(
            SlidesStatus::Completed.transition(SlidesStatus::Completed),
            Ok(SlidesStatus::Completed)
        );
    }

    #[test]
    fn test_slides_status_terminal_states_reject() {
        assert!(SlidesStatus::Failed.transition(SlidesStatus::Completed).is_err());
        assert!(SlidesStatus::Failed.transition(SlidesStatus::Pending).is_err());
        assert!(SlidesStatus::Completed.transition(SlidesStatus::Pending).is_err());
        assert!(SlidesStatus::Completed.transition(SlidesStatus::Failed).is_err());
    }

    #[test]
    fn test_presentation_status_lifecycle() {
        let status = PresentationStatus::Pending;
        let status = status.transition(PresentationStatus::Processing).unwrap();
        let status = status.transition(PresentationStatus::Complete).unwrap();
        assert_eq!(status, PresentationStatus::Complete);
    }

    #[test]
    fn test_presentation_status_rejects_backwards() {
        assert!(PresentationStatus::Complete
            .transition(PresentationStatus::Processing)
            .is_err());
        assert!(PresentationStatus::Complete
            .transition(PresentationStatus::Pending)
            .is_err());
        assert!(PresentationStatus::Processing
            .transition(PresentationStatus::Pending)
            .is_err());
        // Skipping processing is not a thing either
        assert!(PresentationStatus::Pending
            .transition(PresentationStatus::Complete)
            .is_err());
    }
}
