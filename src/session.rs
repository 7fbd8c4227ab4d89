//! Decision sessions: one belief store per conversation, one pipeline per
//! turn.
//!
//! The manager owns all live sessions behind a concurrent map; the pattern
//! library, goal templates and tool registry are loaded once and shared
//! read-only. A turn runs the fixed stage sequence — decay, match, update,
//! derive, select, emit — and returns a self-contained decision record
//! with its full trace.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::try_result::TryResult;
use serde::{Deserialize, Serialize};

use crate::belief::{Belief, BeliefDecl, BeliefStore};
use crate::config::CoreConfig;
use crate::error::{CoreResult, SessionError};
use crate::goal::{Goal, GoalTemplates};
use crate::oracle::AffordanceOracle;
use crate::pattern::{PatternLibrary, PatternMatch, Trigger};
use crate::select::{self, RankedCandidate, Selection, ToolRegistry};
use crate::trace::{Stage, TraceEvent, TurnTrace};

// ---------------------------------------------------------------------------
// Turn input and output
// ---------------------------------------------------------------------------

/// Caller-supplied context for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnContext {
    /// Out-of-band hints from the hosting service (locale, channel,
    /// loyalty tier, ...). Matched by `Condition::Hint`.
    #[serde(default)]
    pub hints: BTreeMap<String, String>,
    /// Tools the hosting service actually invoked in prior turns, most
    /// recent last. Logged with the decision for audit; the core selects
    /// fresh every turn and does not learn from outcomes.
    #[serde(default)]
    pub recent_tools: Vec<String>,
}

/// Everything the core decided in one turn, plus why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub session_id: String,
    pub turn: u64,
    /// The selected tool or the escalation outcome.
    pub selection: Selection,
    /// All scored candidates, best first, each with its rationale.
    pub candidates: Vec<RankedCandidate>,
    /// Active goals this turn, priority descending, truncated to the
    /// configured top-k.
    pub goals: Vec<Goal>,
    /// Abstract triggers for the external coordinator to route.
    pub triggers: Vec<Trigger>,
    /// True when the affordance oracle failed and static scoring applied.
    pub degraded: bool,
    /// Ordered stage-by-stage account of the turn.
    pub trace: TurnTrace,
}

/// One live conversation: private beliefs plus a turn counter.
#[derive(Debug)]
struct DecisionSession {
    beliefs: BeliefStore,
    turn: u64,
    last_activity: Instant,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns all sessions and runs the per-turn pipeline.
///
/// Shareable across threads; sessions are isolated and a single session
/// processes one turn at a time.
pub struct SessionManager {
    config: CoreConfig,
    /// Fresh store cloned for each new session.
    blank_store: BeliefStore,
    library: Arc<PatternLibrary>,
    goals: Arc<GoalTemplates>,
    registry: Arc<ToolRegistry>,
    oracle: Option<Box<dyn AffordanceOracle>>,
    sessions: DashMap<String, DecisionSession>,
}

impl SessionManager {
    /// Build a manager over validated, shared configuration.
    ///
    /// Fails fast on invalid config or an unloadable belief schema; the
    /// registry and library carry their own load-time validation.
    pub fn new(
        config: CoreConfig,
        schema: &[BeliefDecl],
        library: Arc<PatternLibrary>,
        goals: Arc<GoalTemplates>,
        registry: Arc<ToolRegistry>,
        oracle: Option<Box<dyn AffordanceOracle>>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let blank_store = BeliefStore::from_schema(schema)?;
        tracing::info!(
            beliefs = blank_store.len(),
            patterns = library.len(),
            tools = registry.len(),
            "session manager ready"
        );
        Ok(Self {
            config,
            blank_store,
            library,
            goals,
            registry,
            oracle,
            sessions: DashMap::new(),
        })
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot a session's beliefs, name-ordered. `None` for unknown ids.
    pub fn session_beliefs(&self, session_id: &str) -> Option<Vec<(String, Belief)>> {
        self.sessions.get(session_id).map(|s| {
            s.beliefs
                .iter()
                .map(|(name, belief)| (name.clone(), belief.clone()))
                .collect()
        })
    }

    /// Tear down a session. Returns whether it existed.
    pub fn end_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "session ended");
        }
        removed
    }

    /// Drop sessions idle longer than the configured window. Returns how
    /// many were reaped.
    pub fn reap_idle(&self) -> usize {
        let before = self.sessions.len();
        let idle = std::time::Duration::from_secs(self.config.session_idle_secs);
        self.sessions
            .retain(|_, session| session.last_activity.elapsed() < idle);
        let reaped = before - self.sessions.len();
        if reaped > 0 {
            tracing::info!(reaped, "idle sessions reaped");
        }
        reaped
    }

    /// Process one utterance for a session, creating the session on first
    /// contact.
    ///
    /// Runs the full pipeline and returns the decision record. A store
    /// observed in an inconsistent state tears the session down and
    /// reports `SessionError::Corrupted`; the next turn starts fresh.
    pub fn process_turn(
        &self,
        session_id: &str,
        utterance: &str,
        context: &TurnContext,
    ) -> CoreResult<DecisionRecord> {
        if !self.sessions.contains_key(session_id) {
            self.sessions
                .entry(session_id.to_string())
                .or_insert_with(|| DecisionSession {
                    beliefs: self.blank_store.clone(),
                    turn: 0,
                    last_activity: Instant::now(),
                });
            tracing::info!(session_id, "session created");
        }
        let mut session = match self.sessions.try_get_mut(session_id) {
            TryResult::Present(session) => session,
            TryResult::Locked | TryResult::Absent => {
                return Err(SessionError::Busy {
                    session_id: session_id.to_string(),
                }
                .into());
            }
        };

        if let Err(message) = integrity_check(&session.beliefs) {
            drop(session);
            self.sessions.remove(session_id);
            tracing::error!(session_id, %message, "session torn down");
            return Err(SessionError::Corrupted {
                session_id: session_id.to_string(),
                message,
            }
            .into());
        }

        session.turn += 1;
        session.last_activity = Instant::now();
        let now = session.turn;
        let mut trace = TurnTrace::new(now);

        // Decay first: beliefs erode before fresh evidence refreshes them.
        trace.enter(Stage::Decaying);
        let eroded = session.beliefs.decay(
            now,
            self.config.decay_rate,
            self.config.confidence_floor,
        );
        trace.record(TraceEvent::Decayed {
            beliefs_eroded: eroded,
        });

        trace.enter(Stage::Matching);
        let matches = self.library.match_turn(
            utterance,
            &context.hints,
            &session.beliefs,
            self.config.confidence_floor,
        );
        for m in &matches {
            trace.record(TraceEvent::PatternMatched {
                pattern: m.pattern.clone(),
                specificity: m.specificity,
            });
        }

        // Stage all updates against a working copy, then commit as one
        // batch: a rejected update never leaves the store half-written.
        trace.enter(Stage::BeliefUpdating);
        let mut working = session.beliefs.clone();
        let mut triggers = Vec::new();
        for m in &matches {
            let applied = self.apply_match(&mut working, m, now, &mut trace);
            if applied == 0 && !m.observations.is_empty() {
                // Every staged update rejected: the match was ineffective.
                // Substitute its declared failover for this turn only.
                if let Some(failover) = m
                    .failover
                    .as_deref()
                    .filter(|f| *f != m.pattern)
                    .and_then(|f| self.library.materialize_failover(f, utterance))
                {
                    trace.record(TraceEvent::FailoverSubstituted {
                        from: m.pattern.clone(),
                        to: failover.pattern.clone(),
                    });
                    self.apply_match(&mut working, &failover, now, &mut trace);
                    triggers.extend(failover.triggers.clone());
                }
            } else {
                triggers.extend(m.triggers.clone());
            }
        }
        session.beliefs = working;

        trace.enter(Stage::GoalDeriving);
        let mut goals = self.goals.derive(
            &session.beliefs,
            self.config.confidence_floor,
            self.config.goal_threshold,
        );
        goals.truncate(self.config.top_k_goals);
        for goal in &goals {
            trace.record(TraceEvent::GoalDerived {
                goal: goal.name.clone(),
                priority: goal.priority,
            });
        }

        trace.enter(Stage::Selecting);
        let ranked = select::select(
            &goals,
            &session.beliefs,
            &self.registry,
            self.config.confidence_floor,
            self.config.selection_threshold,
            self.oracle.as_deref(),
        );
        if let Some(reason) = &ranked.degradation {
            trace.record(TraceEvent::OracleDegraded {
                reason: reason.clone(),
            });
        }
        for candidate in &ranked.candidates {
            trace.record(TraceEvent::ToolScored {
                tool: candidate.tool.clone(),
                score: candidate.score,
            });
        }
        match &ranked.selection {
            Selection::Tool { name, .. } => {
                let score = ranked
                    .candidates
                    .first()
                    .map(|c| c.score)
                    .unwrap_or_default();
                trace.record(TraceEvent::ToolSelected {
                    tool: name.clone(),
                    score,
                });
            }
            Selection::Escalate { best_score, .. } => {
                trace.record(TraceEvent::NoConfidentSelection {
                    best_score: *best_score,
                });
            }
        }

        trace.enter(Stage::Emitting);
        for trigger in &triggers {
            trace.record(TraceEvent::TriggerEmitted {
                kind: trigger.kind.clone(),
                originating_pattern: trigger.originating_pattern.clone(),
            });
        }

        let degraded = ranked.is_degraded();
        tracing::info!(
            session_id,
            turn = now,
            matches = matches.len(),
            goals = goals.len(),
            recent_tools = context.recent_tools.len(),
            degraded,
            "turn decided"
        );
        Ok(DecisionRecord {
            session_id: session_id.to_string(),
            turn: now,
            selection: ranked.selection,
            candidates: ranked.candidates,
            goals,
            triggers,
            degraded,
            trace,
        })
    }

    /// Apply one match's staged observations; returns how many committed.
    /// Rejections are traced and skipped, never fatal to the turn.
    fn apply_match(
        &self,
        store: &mut BeliefStore,
        m: &PatternMatch,
        now: u64,
        trace: &mut TurnTrace,
    ) -> usize {
        let mut applied = 0;
        for obs in &m.observations {
            match store.update(obs, now, self.config.blend_factor) {
                Ok(outcome) => {
                    trace.record(TraceEvent::BeliefUpdated {
                        belief: obs.name.clone(),
                        confidence: obs.confidence,
                        outcome,
                    });
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        pattern = %m.pattern,
                        belief = %obs.name,
                        error = %e,
                        "belief update rejected"
                    );
                    trace.record(TraceEvent::UpdateRejected {
                        pattern: Some(m.pattern.clone()),
                        belief: obs.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        applied
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("patterns", &self.library.len())
            .field("tools", &self.registry.len())
            .field("oracle", &self.oracle.is_some())
            .finish()
    }
}

/// A belief store is consistent when every confidence is a finite value
/// in [0, 1]. Anything else means external interference or a defect, and
/// the session cannot be trusted to continue.
fn integrity_check(store: &BeliefStore) -> Result<(), String> {
    for (name, belief) in store.iter() {
        if !belief.confidence.is_finite() || !(0.0..=1.0).contains(&belief.confidence) {
            return Err(format!(
                "belief \"{name}\" has confidence {}",
                belief.confidence
            ));
        }
    }
    Ok(())
}
