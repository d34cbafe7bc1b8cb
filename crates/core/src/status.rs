//! Fetch status snapshots.

use serde::{Deserialize, Serialize};

/// Raw state of a fetching unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    /// A fetch is in progress.
    Running,
    /// The last fetch finished and produced a (possibly empty) result set.
    Success,
    /// The last fetch finished without producing a usable result set.
    Failure,
}

impl FetchState {
    /// Whether this state marks a finished fetch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchState::Success | FetchState::Failure)
    }
}

/// Immutable snapshot of a fetching unit's progress.
///
/// Recomputed on demand, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Current state.
    pub state: FetchState,
    /// Completion fraction in `[0.0, 1.0]`.
    pub completion: f32,
    /// Human-readable description, may be empty.
    pub message: String,
}

impl Status {
    /// A running status with the given completion fraction.
    pub fn running(completion: f32, message: impl Into<String>) -> Self {
        Self {
            state: FetchState::Running,
            completion,
            message: message.into(),
        }
    }

    /// A finished, successful status (completion 1.0).
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            state: FetchState::Success,
            completion: 1.0,
            message: message.into(),
        }
    }

    /// A finished, failed status (completion 0.0).
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            state: FetchState::Failure,
            completion: 0.0,
            message: message.into(),
        }
    }

    /// Whether the underlying fetch has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let status = Status::running(0.5, "halfway");
        assert_eq!(status.state, FetchState::Running);
        assert_eq!(status.completion, 0.5);
        assert!(!status.is_terminal());

        let status = Status::success("done");
        assert_eq!(status.completion, 1.0);
        assert!(status.is_terminal());

        let status = Status::failure("boom");
        assert_eq!(status.completion, 0.0);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&FetchState::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&FetchState::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&FetchState::Failure).unwrap(),
            "\"failure\""
        );
    }

    #[test]
    fn test_status_round_trip() {
        let status = Status::running(0.25, "1 of 4");
        let json = serde_json::to_string(&status).unwrap();
        let parsed: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
