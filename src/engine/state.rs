//! Engine lifecycle state machine.
//!
//! ```text
//! Idle → Loading → Ready ⇄ Recording(class)
//!                  Ready/Recording → Paused → (prior state)
//! any → Shutdown (terminal)
//! ```
//!
//! Transition helpers are total: a request that does not apply to the current
//! state returns the state unchanged instead of failing.

use serde::{Deserialize, Serialize};

/// State restored when a paused engine becomes visible again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResumeTarget {
    Ready,
    Recording { class: usize },
}

impl From<ResumeTarget> for EngineState {
    fn from(target: ResumeTarget) -> Self {
        match target {
            ResumeTarget::Ready => EngineState::Ready,
            ResumeTarget::Recording { class } => EngineState::Recording { class },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    /// Not started (or stopped)
    Idle,
    /// Frame source granted, extractor initializing
    Loading,
    /// Loop running, classifying
    Ready,
    /// Loop running, accumulating examples for one class
    Recording { class: usize },
    /// Hidden / unfocused while Ready or Recording
    Paused { resume_to: ResumeTarget },
    /// Resources released; no further transitions
    Shutdown,
}

impl EngineState {
    /// Ticks do work only in these states
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Recording { .. })
    }

    /// Started and not yet stopped or shut down
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineState::Loading
                | EngineState::Ready
                | EngineState::Recording { .. }
                | EngineState::Paused { .. }
        )
    }

    pub fn recording_class(&self) -> Option<usize> {
        match self {
            EngineState::Recording { class } => Some(*class),
            EngineState::Paused {
                resume_to: ResumeTarget::Recording { class },
            } => Some(*class),
            _ => None,
        }
    }

    /// Visibility lost
    pub fn hidden(self) -> Self {
        match self {
            EngineState::Ready => EngineState::Paused {
                resume_to: ResumeTarget::Ready,
            },
            EngineState::Recording { class } => EngineState::Paused {
                resume_to: ResumeTarget::Recording { class },
            },
            other => other,
        }
    }

    /// Visibility regained
    pub fn visible(self) -> Self {
        match self {
            EngineState::Paused { resume_to } => resume_to.into(),
            other => other,
        }
    }

    /// Select a class to record (retargets the resume state while paused)
    pub fn recording(self, class: usize) -> Self {
        match self {
            EngineState::Ready | EngineState::Recording { .. } => EngineState::Recording { class },
            EngineState::Paused { .. } => EngineState::Paused {
                resume_to: ResumeTarget::Recording { class },
            },
            other => other,
        }
    }

    /// Release the recording input
    pub fn not_recording(self) -> Self {
        match self {
            EngineState::Recording { .. } => EngineState::Ready,
            EngineState::Paused {
                resume_to: ResumeTarget::Recording { .. },
            } => EngineState::Paused {
                resume_to: ResumeTarget::Ready,
            },
            other => other,
        }
    }

    /// Short name for logs and telemetry
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Recording { .. } => "recording",
            EngineState::Paused { .. } => "paused",
            EngineState::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume_ready() {
        let paused = EngineState::Ready.hidden();
        assert_eq!(
            paused,
            EngineState::Paused {
                resume_to: ResumeTarget::Ready
            }
        );
        assert_eq!(paused.visible(), EngineState::Ready);
    }

    #[test]
    fn test_pause_and_resume_recording() {
        let paused = EngineState::Recording { class: 2 }.hidden();
        assert_eq!(paused.recording_class(), Some(2));
        assert!(!paused.is_running());
        assert_eq!(paused.visible(), EngineState::Recording { class: 2 });
    }

    #[test]
    fn test_visibility_ignored_when_not_active() {
        assert_eq!(EngineState::Idle.hidden(), EngineState::Idle);
        assert_eq!(EngineState::Idle.visible(), EngineState::Idle);
        assert_eq!(EngineState::Loading.hidden(), EngineState::Loading);
        assert_eq!(EngineState::Shutdown.visible(), EngineState::Shutdown);
    }

    #[test]
    fn test_repeated_transitions_are_noops() {
        let paused = EngineState::Ready.hidden();
        assert_eq!(paused.hidden(), paused);
        assert_eq!(EngineState::Ready.visible(), EngineState::Ready);
        assert_eq!(EngineState::Ready.not_recording(), EngineState::Ready);
        assert_eq!(
            EngineState::Recording { class: 1 }.recording(1),
            EngineState::Recording { class: 1 }
        );
    }

    #[test]
    fn test_recording_while_paused_retargets_resume() {
        let paused = EngineState::Ready.hidden().recording(0);
        assert_eq!(paused.visible(), EngineState::Recording { class: 0 });

        let released = EngineState::Recording { class: 0 }.hidden().not_recording();
        assert_eq!(released.visible(), EngineState::Ready);
    }

    #[test]
    fn test_recording_requires_loaded_engine() {
        assert_eq!(EngineState::Idle.recording(1), EngineState::Idle);
        assert_eq!(EngineState::Loading.recording(1), EngineState::Loading);
        assert_eq!(EngineState::Shutdown.recording(1), EngineState::Shutdown);
    }

    #[test]
    fn test_activity_flags() {
        assert!(!EngineState::Idle.is_active());
        assert!(EngineState::Loading.is_active());
        assert!(!EngineState::Loading.is_running());
        assert!(EngineState::Recording { class: 0 }.is_running());
        assert!(!EngineState::Shutdown.is_active());
    }
}
