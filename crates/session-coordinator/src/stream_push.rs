//! Stream push orchestration.
//!
//! Manages the single outbound transcoded-stream lifecycle:
//! `stopped -> starting -> running -> stopping -> stopped`, with an error
//! state reachable from starting (backend rejection) and running (backend
//! failure event). Layout updates are live, best-effort, and only valid
//! while running.

use crate::errors::CoordinatorError;
use crate::state::StreamPushState;
use provider_api::types::StreamPushConfig;

/// Stream push state owned by the coordinator actor.
#[derive(Debug, Default)]
pub struct StreamPushOrchestrator {
    state: StreamPushState,
    /// Active config; dropped when the push stops or fails to start.
    config: Option<StreamPushConfig>,
}

impl StreamPushOrchestrator {
    /// Create a stopped orchestrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> StreamPushState {
        self.state.clone()
    }

    /// The active push config, if any.
    #[must_use]
    pub fn config(&self) -> Option<&StreamPushConfig> {
        self.config.as_ref()
    }

    /// Begin a start: permitted only from `Stopped` or `Error`.
    ///
    /// # Errors
    ///
    /// `InvalidState` when a push is starting, running, or stopping.
    pub fn begin_start(&mut self, config: StreamPushConfig) -> Result<(), CoordinatorError> {
        match self.state {
            StreamPushState::Stopped | StreamPushState::Error(_) => {
                self.state = StreamPushState::Starting;
                self.config = Some(config);
                Ok(())
            }
            ref other => Err(CoordinatorError::InvalidState(format!(
                "cannot start stream push while {}",
                other.as_str()
            ))),
        }
    }

    /// The backend accepted the push: `Starting -> Running`.
    pub fn complete_start(&mut self) {
        self.state = StreamPushState::Running;
    }

    /// The backend rejected the start; the pending config is discarded.
    pub fn fail_start(&mut self, reason: String) {
        self.state = StreamPushState::Error(reason);
        self.config = None;
    }

    /// Check that a live layout update is valid (only while `Running`).
    ///
    /// # Errors
    ///
    /// `InvalidState` in any other state.
    pub fn ensure_can_update_layout(&self) -> Result<(), CoordinatorError> {
        if self.state == StreamPushState::Running {
            Ok(())
        } else {
            Err(CoordinatorError::InvalidState(format!(
                "cannot update stream push layout while {}",
                self.state.as_str()
            )))
        }
    }

    /// Begin a stop: permitted from any state except `Stopped`.
    ///
    /// # Errors
    ///
    /// `InvalidState` when already stopped.
    pub fn begin_stop(&mut self) -> Result<(), CoordinatorError> {
        if self.state == StreamPushState::Stopped {
            return Err(CoordinatorError::InvalidState(
                "stream push is not active".to_string(),
            ));
        }
        self.state = StreamPushState::Stopping;
        Ok(())
    }

    /// Finish a stop; reached even when the backend stop call failed.
    pub fn complete_stop(&mut self) {
        self.state = StreamPushState::Stopped;
        self.config = None;
    }

    /// Backend-reported failure of the active push.
    pub fn backend_error(&mut self, reason: String) {
        // Only meaningful while a push is underway; a stale event after a
        // stop must not resurrect the error state.
        if matches!(
            self.state,
            StreamPushState::Starting | StreamPushState::Running
        ) {
            self.state = StreamPushState::Error(reason);
            self.config = None;
        }
    }

    /// Tear down without backend interaction (room leave, logout).
    pub fn reset(&mut self) {
        self.state = StreamPushState::Stopped;
        self.config = None;
    }
}
