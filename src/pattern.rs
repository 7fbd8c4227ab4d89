//! Pattern library and matcher: declarative situational rules.
//!
//! A pattern maps trigger conditions (keywords, caller hints, belief state)
//! to staged belief updates and abstract trigger emissions. Patterns never
//! select tools — situational knowledge stays independent from capability
//! knowledge. The library is loaded once, validated, and shared read-only
//! across all sessions.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::belief::{BeliefStore, BeliefValue, Expectation, Observation};
use crate::error::{ConfigError, CoreResult};

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One trigger condition of a pattern. Every declared condition must hold
/// for the pattern to match; the count of conditions is the pattern's
/// specificity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// The utterance contains at least one of these keywords
    /// (case-insensitive substring match).
    Keyword { any_of: Vec<String> },
    /// A caller-supplied context hint is present (and equal, if given).
    Hint {
        key: String,
        equals: Option<String>,
    },
    /// The belief store satisfies an expectation.
    Belief {
        name: String,
        expects: Expectation,
    },
}

/// A belief update a matched pattern stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UpdateSpec {
    /// Set a belief to a fixed value.
    Set {
        belief: String,
        value: BeliefValue,
        confidence: f32,
    },
    /// Capture a number from the utterance and store it as a scalar,
    /// divided by `divisor` and capped at 1.0 (e.g. "10th anniversary"
    /// with divisor 25 → 0.4).
    CaptureScalar {
        belief: String,
        expression: String,
        divisor: f32,
        confidence: f32,
    },
}

/// An abstract trigger emission declared on a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub kind: String,
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
}

/// An abstract outbound event for an external coordinator.
///
/// The core only constructs and returns these; delivery and routing are
/// the coordinator's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: String,
    pub payload: BTreeMap<String, String>,
    pub originating_pattern: String,
}

/// A named situational rule. Immutable once loaded into a library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique pattern name.
    pub name: String,
    /// All conditions must hold for a match.
    pub conditions: Vec<Condition>,
    /// Belief updates to stage on match.
    pub updates: Vec<UpdateSpec>,
    /// Abstract triggers to emit on match.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    /// The pattern's own confidence contribution; scales the confidence
    /// of every update it stages.
    pub confidence: f32,
    /// Pattern to substitute for this turn if every staged update is
    /// judged ineffective downstream.
    #[serde(default)]
    pub failover: Option<String>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// One matched pattern with its staged effects for this turn.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern: String,
    /// Number of declared conditions — more conditions means a more
    /// specific, higher-ranked match.
    pub specificity: usize,
    /// The pattern's confidence contribution.
    pub confidence: f32,
    /// Observations to stage against the belief store.
    pub observations: Vec<Observation>,
    /// Triggers to forward in the decision record.
    pub triggers: Vec<Trigger>,
    /// Declared failover pattern, if any.
    pub failover: Option<String>,
}

/// Read-only library of patterns shared by all sessions.
///
/// Declaration order is stable and doubles as the documented tie-break for
/// equal-specificity matches.
#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<Pattern>,
    /// Compiled capture expressions, parallel to `patterns[i].updates`.
    captures: Vec<Vec<Option<Regex>>>,
}

impl PatternLibrary {
    /// Validate and load a pattern set.
    ///
    /// Fatal configuration errors: duplicate names, out-of-range
    /// confidences, failover references to unknown patterns, and capture
    /// expressions that do not compile or lack a capture group.
    pub fn load(patterns: Vec<Pattern>) -> CoreResult<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for pattern in &patterns {
            if !seen.insert(pattern.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "pattern",
                    name: pattern.name.clone(),
                }
                .into());
            }
            if !(0.0..=1.0).contains(&pattern.confidence) {
                return Err(ConfigError::OutOfRange {
                    field: "pattern.confidence",
                    value: pattern.confidence as f64,
                    expected: "[0, 1]",
                }
                .into());
            }
        }
        for pattern in &patterns {
            if let Some(failover) = &pattern.failover {
                if !seen.contains(failover.as_str()) {
                    return Err(ConfigError::UnknownFailover {
                        pattern: pattern.name.clone(),
                        failover: failover.clone(),
                    }
                    .into());
                }
            }
        }

        let mut captures = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let mut compiled = Vec::with_capacity(pattern.updates.len());
            for update in &pattern.updates {
                match update {
                    UpdateSpec::CaptureScalar {
                        expression, divisor, ..
                    } => {
                        if !(*divisor > 0.0) {
                            return Err(ConfigError::BadCapture {
                                pattern: pattern.name.clone(),
                                message: format!("divisor must be > 0, got {divisor}"),
                            }
                            .into());
                        }
                        let regex =
                            Regex::new(expression).map_err(|e| ConfigError::BadCapture {
                                pattern: pattern.name.clone(),
                                message: e.to_string(),
                            })?;
                        if regex.captures_len() < 2 {
                            return Err(ConfigError::BadCapture {
                                pattern: pattern.name.clone(),
                                message: "expression has no capture group".into(),
                            }
                            .into());
                        }
                        compiled.push(Some(regex));
                    }
                    UpdateSpec::Set { .. } => compiled.push(None),
                }
            }
            captures.push(compiled);
        }

        tracing::info!(patterns = patterns.len(), "pattern library loaded");
        Ok(Self { patterns, captures })
    }

    /// Look up a pattern by name.
    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Evaluate every pattern against the turn input.
    ///
    /// Returns all satisfied patterns ordered by specificity descending;
    /// ties keep declaration order (the sort is stable). The result does
    /// not depend on internal storage order.
    pub fn match_turn(
        &self,
        utterance: &str,
        hints: &BTreeMap<String, String>,
        beliefs: &BeliefStore,
        floor: f32,
    ) -> Vec<PatternMatch> {
        let lowered = utterance.to_lowercase();
        let mut matches = Vec::new();
        for (index, pattern) in self.patterns.iter().enumerate() {
            if pattern.conditions.is_empty() {
                // Condition-less patterns are failover targets only.
                continue;
            }
            let satisfied = pattern
                .conditions
                .iter()
                .all(|c| condition_holds(c, &lowered, hints, beliefs, floor));
            if satisfied {
                matches.push(self.materialize(index, &lowered));
            }
        }
        matches.sort_by_key(|m| std::cmp::Reverse(m.specificity));
        matches
    }

    /// Build a match for a named pattern without evaluating its conditions.
    ///
    /// Used for failover substitution: the substitute applies for this turn
    /// only and the library itself is never mutated.
    pub fn materialize_failover(&self, name: &str, utterance: &str) -> Option<PatternMatch> {
        let index = self.patterns.iter().position(|p| p.name == name)?;
        Some(self.materialize(index, &utterance.to_lowercase()))
    }

    fn materialize(&self, index: usize, lowered_utterance: &str) -> PatternMatch {
        let pattern = &self.patterns[index];
        let mut observations = Vec::new();
        for (update, regex) in pattern.updates.iter().zip(&self.captures[index]) {
            match update {
                UpdateSpec::Set {
                    belief,
                    value,
                    confidence,
                } => observations.push(Observation {
                    name: belief.clone(),
                    value: value.clone(),
                    confidence: confidence * pattern.confidence,
                    source: format!("pattern:{}", pattern.name),
                }),
                UpdateSpec::CaptureScalar {
                    belief,
                    divisor,
                    confidence,
                    ..
                } => {
                    // Compiled at load; Set entries leave a None slot.
                    let Some(regex) = regex else { continue };
                    if let Some(caps) = regex.captures(lowered_utterance) {
                        if let Some(raw) = caps.get(1) {
                            if let Ok(number) = raw.as_str().parse::<f32>() {
                                let scaled = (number / divisor).clamp(0.0, 1.0);
                                observations.push(Observation {
                                    name: belief.clone(),
                                    value: BeliefValue::Scalar(scaled),
                                    confidence: confidence * pattern.confidence,
                                    source: format!("pattern:{}", pattern.name),
                                });
                            }
                        }
                    }
                }
            }
        }

        let triggers = pattern
            .triggers
            .iter()
            .map(|spec| Trigger {
                kind: spec.kind.clone(),
                payload: spec.payload.clone(),
                originating_pattern: pattern.name.clone(),
            })
            .collect();

        PatternMatch {
            pattern: pattern.name.clone(),
            specificity: pattern.conditions.len(),
            confidence: pattern.confidence,
            observations,
            triggers,
            failover: pattern.failover.clone(),
        }
    }
}

fn condition_holds(
    condition: &Condition,
    lowered_utterance: &str,
    hints: &BTreeMap<String, String>,
    beliefs: &BeliefStore,
    floor: f32,
) -> bool {
    match condition {
        Condition::Keyword { any_of } => any_of
            .iter()
            .any(|kw| lowered_utterance.contains(&kw.to_lowercase())),
        Condition::Hint { key, equals } => match (hints.get(key), equals) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        },
        Condition::Belief { name, expects } => expects.satisfied(beliefs.get(name), floor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{BeliefDecl, ValueKind};

    fn store() -> BeliefStore {
        BeliefStore::from_schema(&[BeliefDecl {
            name: "business_context".into(),
            kind: ValueKind::Flag,
            initial: BeliefValue::Flag(false),
            initial_confidence: 0.0,
            decay_rate: None,
        }])
        .unwrap()
    }

    fn keyword_pattern(name: &str, keywords: &[&str]) -> Pattern {
        Pattern {
            name: name.into(),
            conditions: vec![Condition::Keyword {
                any_of: keywords.iter().map(|s| s.to_string()).collect(),
            }],
            updates: vec![UpdateSpec::Set {
                belief: "business_context".into(),
                value: BeliefValue::Flag(true),
                confidence: 0.9,
            }],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        }
    }

    #[test]
    fn keyword_match_stages_observation() {
        let library = PatternLibrary::load(vec![keyword_pattern(
            "business_greeting",
            &["conference", "meeting"],
        )])
        .unwrap();
        let matches = library.match_turn(
            "I'm here for the Azure conference",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern, "business_greeting");
        assert_eq!(matches[0].observations.len(), 1);
        assert_eq!(matches[0].observations[0].name, "business_context");
    }

    #[test]
    fn non_matching_utterance_yields_nothing() {
        let library =
            PatternLibrary::load(vec![keyword_pattern("business_greeting", &["conference"])])
                .unwrap();
        let matches = library.match_turn(
            "what time is breakfast?",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn more_specific_pattern_ranks_first() {
        let mut broad = keyword_pattern("broad", &["checking in"]);
        broad.confidence = 0.8;
        let mut narrow = keyword_pattern("narrow", &["checking in"]);
        narrow.conditions.push(Condition::Keyword {
            any_of: vec!["anniversary".into()],
        });
        narrow.conditions.push(Condition::Keyword {
            any_of: vec!["trip".into()],
        });

        // Declared broad-first; the 3-condition pattern must still rank above.
        let library = PatternLibrary::load(vec![broad, narrow]).unwrap();
        let matches = library.match_turn(
            "we're checking in, it's our anniversary trip",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].pattern, "narrow");
        assert_eq!(matches[0].specificity, 3);
        assert_eq!(matches[1].pattern, "broad");
    }

    #[test]
    fn equal_specificity_keeps_declaration_order() {
        let library = PatternLibrary::load(vec![
            keyword_pattern("first", &["hello"]),
            keyword_pattern("second", &["hello"]),
        ])
        .unwrap();
        let matches = library.match_turn("hello there", &BTreeMap::new(), &store(), 0.05);
        assert_eq!(matches[0].pattern, "first");
        assert_eq!(matches[1].pattern, "second");
    }

    #[test]
    fn capture_scalar_extracts_magnitude() {
        let pattern = Pattern {
            name: "anniversary_magnitude".into(),
            conditions: vec![Condition::Keyword {
                any_of: vec!["anniversary".into()],
            }],
            updates: vec![UpdateSpec::CaptureScalar {
                belief: "celebration_magnitude".into(),
                expression: r"(\d+)(?:st|nd|rd|th)?\s*(?:year|anniversary)".into(),
                divisor: 25.0,
                confidence: 0.95,
            }],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        };
        let library = PatternLibrary::load(vec![pattern]).unwrap();
        let matches = library.match_turn(
            "it's our 10th anniversary trip!",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert_eq!(matches[0].observations.len(), 1);
        assert_eq!(
            matches[0].observations[0].value,
            BeliefValue::Scalar(10.0 / 25.0)
        );
    }

    #[test]
    fn capture_without_number_stages_nothing() {
        let pattern = Pattern {
            name: "anniversary_magnitude".into(),
            conditions: vec![Condition::Keyword {
                any_of: vec!["anniversary".into()],
            }],
            updates: vec![UpdateSpec::CaptureScalar {
                belief: "celebration_magnitude".into(),
                expression: r"(\d+)(?:st|nd|rd|th)?\s*anniversary".into(),
                divisor: 25.0,
                confidence: 0.95,
            }],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        };
        let library = PatternLibrary::load(vec![pattern]).unwrap();
        let matches = library.match_turn(
            "happy anniversary to us",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert_eq!(matches.len(), 1);
        assert!(matches[0].observations.is_empty());
    }

    #[test]
    fn hint_condition_requires_presence_and_value() {
        let mut pattern = keyword_pattern("localized", &["hello"]);
        pattern.conditions.push(Condition::Hint {
            key: "locale".into(),
            equals: Some("ja-JP".into()),
        });
        let library = PatternLibrary::load(vec![pattern]).unwrap();

        let mut hints = BTreeMap::new();
        assert!(library
            .match_turn("hello", &hints, &store(), 0.05)
            .is_empty());
        hints.insert("locale".into(), "ja-JP".into());
        assert_eq!(library.match_turn("hello", &hints, &store(), 0.05).len(), 1);
    }

    #[test]
    fn unknown_failover_is_config_error() {
        let mut pattern = keyword_pattern("p", &["x"]);
        pattern.failover = Some("missing".into());
        assert!(PatternLibrary::load(vec![pattern]).is_err());
    }

    #[test]
    fn duplicate_pattern_name_is_config_error() {
        let result = PatternLibrary::load(vec![
            keyword_pattern("same", &["a"]),
            keyword_pattern("same", &["b"]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn bad_capture_expression_is_config_error() {
        let pattern = Pattern {
            name: "bad".into(),
            conditions: vec![],
            updates: vec![UpdateSpec::CaptureScalar {
                belief: "x".into(),
                expression: r"\d+".into(), // no capture group
                divisor: 1.0,
                confidence: 0.5,
            }],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        };
        assert!(PatternLibrary::load(vec![pattern]).is_err());
    }

    #[test]
    fn triggers_carry_originating_pattern() {
        let mut pattern = keyword_pattern("vip_arrival", &["penthouse"]);
        pattern.triggers.push(TriggerSpec {
            kind: "notify".into(),
            payload: BTreeMap::from([("team".into(), "front_desk".into())]),
        });
        let library = PatternLibrary::load(vec![pattern]).unwrap();
        let matches = library.match_turn(
            "we booked the penthouse",
            &BTreeMap::new(),
            &store(),
            0.05,
        );
        assert_eq!(matches[0].triggers.len(), 1);
        assert_eq!(matches[0].triggers[0].originating_pattern, "vip_arrival");
        assert_eq!(matches[0].triggers[0].kind, "notify");
    }
}
