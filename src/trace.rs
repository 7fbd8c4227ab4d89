//! Per-turn structured trace: one event stream per stage transition.
//!
//! The trace is a plain value handed back inside the decision record — an
//! ordered mapping of stage to stage output with no embedded side effects.
//! Persistence and querying belong to external audit tooling; the core also
//! mirrors each event onto `tracing` for live logs.

use serde::{Deserialize, Serialize};

use crate::belief::MergeOutcome;

/// The per-turn pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Decaying,
    Matching,
    BeliefUpdating,
    GoalDeriving,
    Selecting,
    Emitting,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decaying => "decaying",
            Self::Matching => "matching",
            Self::BeliefUpdating => "belief_updating",
            Self::GoalDeriving => "goal_deriving",
            Self::Selecting => "selecting",
            Self::Emitting => "emitting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One observable event inside a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraceEvent {
    /// How many beliefs lost confidence in the decay pass.
    Decayed { beliefs_eroded: usize },
    PatternMatched { pattern: String, specificity: usize },
    /// A matched pattern was judged ineffective and its declared failover
    /// was substituted for this turn only.
    FailoverSubstituted { from: String, to: String },
    BeliefUpdated {
        belief: String,
        confidence: f32,
        outcome: MergeOutcome,
    },
    /// A single staged update failed validation and was skipped.
    UpdateRejected {
        pattern: Option<String>,
        belief: String,
        reason: String,
    },
    GoalDerived { goal: String, priority: f32 },
    ToolScored { tool: String, score: f32 },
    ToolSelected { tool: String, score: f32 },
    NoConfidentSelection { best_score: f32 },
    /// The affordance oracle failed or timed out; static scoring was used.
    OracleDegraded { reason: String },
    TriggerEmitted {
        kind: String,
        originating_pattern: String,
    },
}

/// Events recorded while one stage ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub events: Vec<TraceEvent>,
}

/// The ordered, per-turn trace emitted alongside every decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTrace {
    pub turn: u64,
    pub stages: Vec<StageRecord>,
}

impl TurnTrace {
    pub fn new(turn: u64) -> Self {
        Self {
            turn,
            stages: Vec::new(),
        }
    }

    /// Enter a stage; subsequent events are recorded under it.
    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!(turn = self.turn, stage = %stage, "stage transition");
        self.stages.push(StageRecord {
            stage,
            events: Vec::new(),
        });
    }

    /// Record an event in the current stage.
    ///
    /// Events before the first `enter` would indicate a pipeline bug; they
    /// are attributed to a synthetic Decaying stage rather than dropped.
    pub fn record(&mut self, event: TraceEvent) {
        if self.stages.is_empty() {
            self.enter(Stage::Decaying);
        }
        if let Some(current) = self.stages.last_mut() {
            current.events.push(event);
        }
    }

    /// All events across stages, in order.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.stages.iter().flat_map(|s| s.events.iter())
    }

    /// Whether any recorded event marks degraded oracle mode.
    pub fn is_degraded(&self) -> bool {
        self.events()
            .any(|e| matches!(e, TraceEvent::OracleDegraded { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_recorded_in_order() {
        let mut trace = TurnTrace::new(3);
        trace.enter(Stage::Decaying);
        trace.record(TraceEvent::Decayed { beliefs_eroded: 2 });
        trace.enter(Stage::Matching);
        trace.record(TraceEvent::PatternMatched {
            pattern: "anniversary_celebration".into(),
            specificity: 2,
        });

        assert_eq!(trace.stages.len(), 2);
        assert_eq!(trace.stages[0].stage, Stage::Decaying);
        assert_eq!(trace.stages[1].stage, Stage::Matching);
        assert_eq!(trace.events().count(), 2);
    }

    #[test]
    fn degraded_flag_tracks_oracle_events() {
        let mut trace = TurnTrace::new(1);
        trace.enter(Stage::Selecting);
        assert!(!trace.is_degraded());
        trace.record(TraceEvent::OracleDegraded {
            reason: "timeout".into(),
        });
        assert!(trace.is_degraded());
    }

    #[test]
    fn trace_serializes_to_json() {
        let mut trace = TurnTrace::new(7);
        trace.enter(Stage::GoalDeriving);
        trace.record(TraceEvent::GoalDerived {
            goal: "create_memorable_experience".into(),
            priority: 0.85,
        });
        let json = serde_json::to_string(&trace).unwrap();
        assert!(json.contains("GoalDeriving"));
        assert!(json.contains("create_memorable_experience"));
    }
}
