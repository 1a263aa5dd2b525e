//! State machine for tracking a release run
//!
//! Transitions are kept in memory for the lifetime of the run only; a release
//! run is stateless across invocations and nothing is written to disk.

use crate::core::error::ReleaseError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Release run state
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    Start,
    ExtractCoordinates,
    PublishMetadata,
    MetadataPublished,
    SelectCredentials,
    InvokeUpload,
    Uploaded,
    Success,
    Failed,
}

impl ReleaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseState::Success | ReleaseState::Failed)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateTransition {
    pub from: ReleaseState,
    pub to: ReleaseState,
    pub timestamp: DateTime<Utc>,
    /// Free-form note, e.g. the error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// State machine for tracking the release workflow
#[derive(Debug)]
pub struct ReleaseStateMachine {
    current_state: ReleaseState,
    transitions: Vec<StateTransition>,
    error: Option<String>,
}

impl Default for ReleaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: ReleaseState::Start,
            transitions: Vec::new(),
            error: None,
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: ReleaseState, detail: Option<String>) {
        tracing::debug!(from = ?self.current_state, to = ?to, "release state transition");

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            detail,
        });
        self.current_state = to;
    }

    /// Record a terminal failure
    pub fn fail(&mut self, error: &ReleaseError) {
        self.error = Some(error.to_string());
        self.transition(ReleaseState::Failed, Some(error.code().to_string()));
    }

    pub fn state(&self) -> ReleaseState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Milliseconds between the first and last recorded transition
    pub fn elapsed_ms(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let detail = t
                    .detail
                    .as_ref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                format!(
                    "{}: {:?} → {:?}{}",
                    t.timestamp.to_rfc3339(),
                    t.from,
                    t.to,
                    detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
