//! Per-request pipeline state machine
//!
//! FETCHING → INFERRING → VALIDATING → { REJECTED | PERSISTING → DONE },
//! with FAILED reachable from every non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a run ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Network,
    RateLimited,
    ModelUnavailable,
    Validation,
    InvalidRequest,
    Persistence,
}

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    /// Catalog sample + image download
    Fetching,
    /// Waiting on the inference provider
    Inferring,
    /// Parsing and normalizing model output
    Validating,
    /// Writing the analysis record
    Persisting,
    /// Record stored, upload kept
    Done,
    /// Model said the image is not a plant
    Rejected,
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Rejected | PipelineState::Failed(_)
        )
    }

    /// Whether leaving `self` for `next` follows the state machine
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Done | Rejected | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Fetching, Inferring) => true,
            (Inferring, Validating) => true,
            (Validating, Rejected | Persisting) => true,
            (Persisting, Done) => true,
            _ => false,
        }
    }
}

/// Recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory tracking for one analysis request
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    /// Set when a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Fetching,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: PipelineState) -> StateTransition {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                run_id = %self.run_id,
                from = ?self.state,
                to = ?new_state,
                "Unexpected pipeline state transition"
            );
        }

        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        tracing::debug!(
            run_id = %self.run_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Pipeline state transition"
        );

        transition
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Milliseconds from start to end (or to now while still running)
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

impl Default for AnalysisRun {
    fn default() -> Self {
        Self::new()
    }
}
