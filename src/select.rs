//! Tool selection: affordance matching with explainable ranking.
//!
//! Every available tool is scored against the top goal and the current
//! beliefs; the result is a ranked list with a human-readable rationale
//! per candidate. Explainability is a hard requirement here, not a debug
//! aid — operators audit why a capability was invoked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::belief::{Belief, BeliefStore};
use crate::error::{ConfigError, CoreResult};
use crate::goal::Goal;
use crate::oracle::AffordanceOracle;

// ---------------------------------------------------------------------------
// Descriptors and registry
// ---------------------------------------------------------------------------

/// Static description of one capability the agent can invoke.
///
/// The core only knows descriptors and affordances, never the tool's
/// internal logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique capability identifier.
    pub name: String,
    /// Natural-language affordance description (oracle input).
    pub description: String,
    /// Affordance profile: capability dimension → strength in [0, 1].
    pub affordances: BTreeMap<String, f32>,
    /// Beliefs this tool wants confident before it is a good choice.
    /// Weak support penalizes the tool but never excludes it.
    #[serde(default)]
    pub preconditions: Vec<String>,
}

/// Read-only registry of tool descriptors shared by all sessions.
///
/// Declaration order is stable and is the documented tie-break when two
/// tools score identically.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    /// Capability recommended when no tool clears the acceptance threshold.
    escalation: Option<String>,
}

impl ToolRegistry {
    /// Validate and load the registry.
    ///
    /// An empty registry is a fatal configuration error, reported at load,
    /// never per turn.
    pub fn load(tools: Vec<ToolDescriptor>, escalation: Option<String>) -> CoreResult<Self> {
        if tools.is_empty() {
            return Err(ConfigError::EmptyToolRegistry.into());
        }
        let mut seen = std::collections::BTreeSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "tool",
                    name: tool.name.clone(),
                }
                .into());
            }
            for (dimension, strength) in &tool.affordances {
                if !(0.0..=1.0).contains(strength) || !strength.is_finite() {
                    return Err(ConfigError::BadAffordance {
                        tool: tool.name.clone(),
                        dimension: dimension.clone(),
                        value: *strength,
                    }
                    .into());
                }
            }
        }
        if let Some(name) = &escalation {
            if !seen.contains(name.as_str()) {
                return Err(ConfigError::UnknownEscalation { name: name.clone() }.into());
            }
        }
        tracing::info!(tools = tools.len(), "tool registry loaded");
        Ok(Self { tools, escalation })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn escalation(&self) -> Option<&str> {
        self.escalation.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Selection result
// ---------------------------------------------------------------------------

/// One scored candidate in the ranked list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub tool: String,
    /// `alignment × belief_multiplier`.
    pub score: f32,
    pub alignment: f32,
    pub belief_multiplier: f32,
    /// Why this candidate scored the way it did.
    pub rationale: String,
}

/// The selector's verdict for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Selection {
    /// A confident selection: the tool plus the belief subset relevant to
    /// its preconditions, for the caller to dispatch.
    Tool {
        name: String,
        relevant_beliefs: BTreeMap<String, Belief>,
    },
    /// Defined terminal state, not an error: nothing cleared the
    /// acceptance threshold; the declared escalation capability is
    /// recommended.
    Escalate {
        recommended: Option<String>,
        best_score: f32,
    },
}

/// Full ranked output of one selection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSelection {
    pub selection: Selection,
    /// All candidates, highest score first; ties keep registry order.
    pub candidates: Vec<RankedCandidate>,
    /// Set when the oracle failed and static scoring was used instead.
    pub degradation: Option<String>,
}

impl RankedSelection {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Alignment for a goal with no declared capability needs.
const NEUTRAL_ALIGNMENT: f32 = 0.5;

/// Score every tool against the top goal and pick the best.
///
/// Deterministic and idempotent for identical inputs: no randomness, and
/// equal scores resolve by registry declaration order (stable sort). The
/// oracle, when given, replaces the static alignment score; any oracle
/// failure degrades the whole pass back to static scoring so candidate
/// scores stay comparable.
pub fn select(
    goals: &[Goal],
    beliefs: &BeliefStore,
    registry: &ToolRegistry,
    floor: f32,
    acceptance_threshold: f32,
    oracle: Option<&dyn AffordanceOracle>,
) -> RankedSelection {
    let Some(top_goal) = goals.first() else {
        // No salient goal this turn — nothing to align against.
        return RankedSelection {
            selection: Selection::Escalate {
                recommended: registry.escalation().map(String::from),
                best_score: 0.0,
            },
            candidates: Vec::new(),
            degradation: None,
        };
    };

    // Try the oracle for every tool first; fall back wholesale on failure.
    let mut degradation = None;
    let oracle_scores: Option<Vec<f32>> = oracle.and_then(|oracle| {
        let mut scores = Vec::with_capacity(registry.tools.len());
        for tool in &registry.tools {
            match oracle.similarity(&tool.description, &top_goal.name) {
                Ok(score) => scores.push(score),
                Err(e) => {
                    tracing::warn!(tool = %tool.name, error = %e, "oracle degraded, using static scoring");
                    degradation = Some(e.to_string());
                    return None;
                }
            }
        }
        Some(scores)
    });

    let mut candidates: Vec<RankedCandidate> = registry
        .tools
        .iter()
        .enumerate()
        .map(|(i, tool)| {
            let alignment = match &oracle_scores {
                Some(scores) => scores[i],
                None => static_alignment(tool, top_goal),
            };
            let (multiplier, support) = belief_multiplier(tool, beliefs, floor);
            let score = alignment * multiplier;
            let rationale = build_rationale(tool, top_goal, alignment, &support, beliefs);
            RankedCandidate {
                tool: tool.name.clone(),
                score,
                alignment,
                belief_multiplier: multiplier,
                rationale,
            }
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let best = &candidates[0];
    let selection = if best.score >= acceptance_threshold {
        let preconditions = registry
            .get(&best.tool)
            .map(|t| t.preconditions.clone())
            .unwrap_or_default();
        let relevant_beliefs = preconditions
            .iter()
            .filter_map(|name| beliefs.get(name).map(|b| (name.clone(), b.clone())))
            .collect();
        Selection::Tool {
            name: best.tool.clone(),
            relevant_beliefs,
        }
    } else {
        Selection::Escalate {
            recommended: registry.escalation().map(String::from),
            best_score: best.score,
        }
    };

    RankedSelection {
        selection,
        candidates,
        degradation,
    }
}

/// Static alignment: mean affordance strength over the goal's required
/// capability dimensions. Dimensions the tool lacks count as zero.
fn static_alignment(tool: &ToolDescriptor, goal: &Goal) -> f32 {
    if goal.capabilities.is_empty() {
        return NEUTRAL_ALIGNMENT;
    }
    let sum: f32 = goal
        .capabilities
        .iter()
        .map(|cap| tool.affordances.get(cap).copied().unwrap_or(0.0))
        .sum();
    sum / goal.capabilities.len() as f32
}

/// Precondition confidence multiplier in [0.5, 1.0]: rewards confidently
/// supported preconditions, penalizes weak ones, never excludes a tool.
///
/// Also returns the per-precondition confidences for the rationale.
fn belief_multiplier(
    tool: &ToolDescriptor,
    beliefs: &BeliefStore,
    floor: f32,
) -> (f32, Vec<(String, f32)>) {
    if tool.preconditions.is_empty() {
        return (1.0, Vec::new());
    }
    let mut support = Vec::with_capacity(tool.preconditions.len());
    let mut sum = 0.0;
    for name in &tool.preconditions {
        let confidence = beliefs
            .get(name)
            .filter(|b| b.is_salient(floor))
            .map(|b| b.confidence)
            .unwrap_or(0.0);
        sum += 0.5 + 0.5 * confidence;
        support.push((name.clone(), confidence));
    }
    (sum / tool.preconditions.len() as f32, support)
}

/// Rationale from the top two contributing factors: the goal served plus
/// the precondition beliefs that most increased the score.
fn build_rationale(
    tool: &ToolDescriptor,
    goal: &Goal,
    alignment: f32,
    support: &[(String, f32)],
    beliefs: &BeliefStore,
) -> String {
    let mut strongest: Vec<&(String, f32)> = support.iter().collect();
    strongest.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut rationale = format!(
        "{}: serves goal \"{}\" (alignment {:.2})",
        tool.name, goal.name, alignment
    );
    let cited: Vec<String> = strongest
        .iter()
        .take(2)
        .filter(|(_, confidence)| *confidence > 0.0)
        .map(|(name, confidence)| match beliefs.get(name) {
            Some(belief) => belief.explain(name),
            None => format!("{name} ({confidence:.2})"),
        })
        .collect();
    if cited.is_empty() {
        rationale.push_str("; no confident belief support");
    } else {
        rationale.push_str(&format!("; supported by {}", cited.join(", ")));
    }
    rationale
}
