//! Belief store: confidence-weighted facts about the current conversation.
//!
//! Beliefs are declared up front in a schema (name + value kind + decay
//! behavior); observations merge into them via a confidence-weighted rule and
//! confidence erodes toward a floor between observations. Each decision
//! session exclusively owns one store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BeliefError, CoreResult};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// The value kind a belief is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// A named label, e.g. `special_occasion = "anniversary"`.
    Categorical,
    /// A boolean, e.g. `business_context = true`.
    Flag,
    /// A bounded scalar in [0, 1], e.g. `urgency_level = 0.7`.
    Scalar,
}

impl ValueKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Flag => "flag",
            Self::Scalar => "scalar",
        }
    }
}

/// A belief's value: tagged variant so merge logic is exhaustive per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BeliefValue {
    Categorical(String),
    Flag(bool),
    Scalar(f32),
}

impl BeliefValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Categorical(_) => ValueKind::Categorical,
            Self::Flag(_) => ValueKind::Flag,
            Self::Scalar(_) => ValueKind::Scalar,
        }
    }

    /// Whether the value counts as "set": a non-empty label, a true flag,
    /// or a scalar above zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Categorical(label) => !label.is_empty() && label != "unknown",
            Self::Flag(b) => *b,
            Self::Scalar(v) => *v > 0.0,
        }
    }
}

impl std::fmt::Display for BeliefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Categorical(label) => write!(f, "{label}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Scalar(v) => write!(f, "{v:.2}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations and observations
// ---------------------------------------------------------------------------

/// Schema entry declaring one belief the store tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefDecl {
    /// Unique belief name.
    pub name: String,
    /// The value kind every update must match.
    pub kind: ValueKind,
    /// Starting value.
    pub initial: BeliefValue,
    /// Starting confidence.
    pub initial_confidence: f32,
    /// Per-belief decay rate override; `Some(0.0)` means the belief never
    /// decays (e.g. guest culture), `None` uses the global rate.
    pub decay_rate: Option<f32>,
}

/// A single validated-on-apply observation against one belief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    pub value: BeliefValue,
    pub confidence: f32,
    /// Where the observation came from, e.g. "explicit_mention".
    pub source: String,
}

// ---------------------------------------------------------------------------
// Belief
// ---------------------------------------------------------------------------

/// A named, confidence-weighted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub value: BeliefValue,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Logical turn of the last refreshing observation.
    pub last_updated: u64,
    /// Source label of the last observation.
    pub source: String,
    /// Per-belief decay override (see [`BeliefDecl::decay_rate`]).
    pub decay_rate: Option<f32>,
}

impl Belief {
    /// Whether consumers should treat this belief as known.
    ///
    /// Sub-floor beliefs remain queryable but carry no decision weight.
    pub fn is_salient(&self, floor: f32) -> bool {
        self.confidence >= floor && self.value.is_truthy()
    }

    /// One-line human-readable explanation, used in rationale strings.
    pub fn explain(&self, name: &str) -> String {
        format!(
            "{name}={} (confidence {:.2}, via {})",
            self.value, self.confidence, self.source
        )
    }
}

/// What a pattern condition or goal dependency expects of a belief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expectation {
    /// The belief is known: at or above the floor with a truthy value.
    Salient,
    /// The belief holds exactly this value (and is salient).
    Equals(BeliefValue),
    /// Scalar belief with value >= the given bound (and salient).
    AtLeast(f32),
}

impl Expectation {
    /// Whether a belief satisfies this expectation.
    pub fn satisfied(&self, belief: Option<&Belief>, floor: f32) -> bool {
        let Some(belief) = belief else { return false };
        match self {
            Self::Salient => belief.is_salient(floor),
            Self::Equals(value) => belief.confidence >= floor && belief.value == *value,
            Self::AtLeast(bound) => {
                belief.confidence >= floor
                    && matches!(belief.value, BeliefValue::Scalar(v) if v >= *bound)
            }
        }
    }
}

/// What the confidence-weighted merge did with an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeOutcome {
    /// Incoming confidence was higher: value replaced.
    Replaced,
    /// Equal confidence: most-recent observation won; the conflict is
    /// logged, not raised.
    ConflictMostRecent,
    /// Incoming confidence was lower: value kept, confidence nudged up.
    Blended { new_confidence: f32 },
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Equal-confidence tolerance for the merge rule.
const CONFIDENCE_EPSILON: f32 = 1e-6;

/// Mapping from belief name to belief, owned exclusively by one session.
///
/// `BTreeMap` keeps iteration deterministic, which the selector's
/// idempotence guarantee depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefStore {
    beliefs: BTreeMap<String, Belief>,
    /// Turn the last decay pass ran at; decay applies the turns elapsed
    /// since then, so running it once per turn compounds correctly.
    last_decay: u64,
}

impl BeliefStore {
    /// Seed a store from a declared schema. Duplicate names are a
    /// configuration error.
    pub fn from_schema(schema: &[BeliefDecl]) -> CoreResult<Self> {
        let mut beliefs = BTreeMap::new();
        for decl in schema {
            if beliefs.contains_key(&decl.name) {
                return Err(crate::error::ConfigError::Duplicate {
                    kind: "belief",
                    name: decl.name.clone(),
                }
                .into());
            }
            if decl.kind != decl.initial.kind() {
                return Err(BeliefError::KindMismatch {
                    name: decl.name.clone(),
                    declared: decl.kind.label(),
                    got: decl.initial.kind().label(),
                }
                .into());
            }
            beliefs.insert(
                decl.name.clone(),
                Belief {
                    value: decl.initial.clone(),
                    confidence: decl.initial_confidence.clamp(0.0, 1.0),
                    last_updated: 0,
                    source: "initial".into(),
                    decay_rate: decl.decay_rate,
                },
            );
        }
        Ok(Self {
            beliefs,
            last_decay: 0,
        })
    }

    /// Look up a belief by name.
    pub fn get(&self, name: &str) -> Option<&Belief> {
        self.beliefs.get(name)
    }

    /// Iterate over all beliefs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Belief)> {
        self.beliefs.iter()
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Belief> {
        self.beliefs.get_mut(name)
    }

    /// Number of declared beliefs.
    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }

    /// Beliefs at or above the given confidence, truthy-valued.
    pub fn salient(&self, floor: f32) -> Vec<(&String, &Belief)> {
        self.beliefs
            .iter()
            .filter(|(_, b)| b.is_salient(floor))
            .collect()
    }

    /// Merge one observation into the store.
    ///
    /// `blend_factor` is the α used when a lower-confidence observation
    /// nudges an existing belief. Validation failures (unknown name,
    /// out-of-range confidence, kind mismatch) reject only this
    /// observation; the caller decides whether to continue with the rest
    /// of the batch.
    pub fn update(
        &mut self,
        obs: &Observation,
        now: u64,
        blend_factor: f32,
    ) -> Result<MergeOutcome, BeliefError> {
        if !(0.0..=1.0).contains(&obs.confidence) || !obs.confidence.is_finite() {
            return Err(BeliefError::ConfidenceOutOfRange {
                name: obs.name.clone(),
                confidence: obs.confidence,
            });
        }
        if let BeliefValue::Scalar(v) = obs.value {
            if !(0.0..=1.0).contains(&v) || !v.is_finite() {
                return Err(BeliefError::ScalarOutOfRange {
                    name: obs.name.clone(),
                    value: v,
                });
            }
        }

        let belief = self
            .beliefs
            .get_mut(&obs.name)
            .ok_or_else(|| BeliefError::Unknown {
                name: obs.name.clone(),
            })?;

        if belief.value.kind() != obs.value.kind() {
            return Err(BeliefError::KindMismatch {
                name: obs.name.clone(),
                declared: belief.value.kind().label(),
                got: obs.value.kind().label(),
            });
        }

        let delta = obs.confidence - belief.confidence;
        let outcome = if delta > CONFIDENCE_EPSILON {
            belief.value = obs.value.clone();
            belief.confidence = obs.confidence;
            belief.source = obs.source.clone();
            MergeOutcome::Replaced
        } else if delta.abs() <= CONFIDENCE_EPSILON {
            // Equal confidence: most-recent wins by declared policy.
            let conflicting = belief.value != obs.value;
            belief.value = obs.value.clone();
            belief.source = obs.source.clone();
            if conflicting {
                tracing::warn!(
                    belief = %obs.name,
                    confidence = obs.confidence,
                    "equal-confidence conflict resolved most-recent-wins"
                );
            }
            MergeOutcome::ConflictMostRecent
        } else {
            // Supporting evidence: keep the value, nudge confidence upward.
            let blended = (belief.confidence + blend_factor * obs.confidence).min(1.0);
            belief.confidence = blended;
            MergeOutcome::Blended {
                new_confidence: blended,
            }
        };
        belief.last_updated = now;
        Ok(outcome)
    }

    /// Erode every belief's confidence toward the floor for the turns
    /// elapsed since the previous decay pass.
    ///
    /// Never deletes a belief and never raises a sub-floor confidence;
    /// returns how many beliefs actually lost confidence.
    pub fn decay(&mut self, now: u64, global_rate: f32, floor: f32) -> usize {
        let elapsed = now.saturating_sub(self.last_decay);
        self.last_decay = now;
        if elapsed == 0 {
            return 0;
        }

        let mut decayed = 0;
        for belief in self.beliefs.values_mut() {
            let rate = belief.decay_rate.unwrap_or(global_rate);
            if rate <= 0.0 || belief.confidence <= floor {
                continue;
            }
            let factor = (-rate * elapsed as f32).exp();
            let eroded = (belief.confidence * factor).max(floor);
            if eroded < belief.confidence {
                belief.confidence = eroded;
                decayed += 1;
            }
        }
        decayed
    }
}
