//! Goal derivation: converting beliefs into prioritized desires.
//!
//! Goal templates are declarative: a base weight, the beliefs the goal
//! depends on, and the capability dimensions a tool needs to serve it.
//! Goals are derived fresh every turn and never persisted — created,
//! ranked, consumed, discarded within one turn.

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefStore, Expectation};
use crate::error::{ConfigError, CoreResult};

/// One belief dependency of a goal template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDependency {
    pub belief: String,
    pub expects: Expectation,
}

/// Declarative template a goal is derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTemplate {
    /// Unique goal name.
    pub name: String,
    /// Base priority weight in [0, 1].
    pub base_weight: f32,
    /// Beliefs the goal depends on. The goal's effective priority is
    /// capped by the weakest of these.
    pub requires: Vec<GoalDependency>,
    /// Affordance dimensions a tool needs to serve this goal.
    pub capabilities: Vec<String>,
}

/// A goal derived for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    /// `base_weight × min(dependency confidences)`.
    pub priority: f32,
    /// The (belief, confidence) pairs that support this goal.
    pub support: Vec<(String, f32)>,
    /// Capability dimensions carried over from the template.
    pub capabilities: Vec<String>,
}

/// Validated, read-only set of goal templates.
///
/// Declaration order is the documented precedence for equal-priority goals.
#[derive(Debug)]
pub struct GoalTemplates {
    templates: Vec<GoalTemplate>,
}

impl GoalTemplates {
    /// Validate and load goal templates.
    pub fn load(templates: Vec<GoalTemplate>) -> CoreResult<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for template in &templates {
            if !seen.insert(template.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "goal",
                    name: template.name.clone(),
                }
                .into());
            }
            if !(0.0..=1.0).contains(&template.base_weight) {
                return Err(ConfigError::OutOfRange {
                    field: "goal.base_weight",
                    value: template.base_weight as f64,
                    expected: "[0, 1]",
                }
                .into());
            }
        }
        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Derive this turn's goals from the current beliefs.
    ///
    /// Effective priority is `base_weight × min(dependency confidences)` —
    /// a goal can never be asserted more strongly than its weakest
    /// supporting belief. An unmet expectation contributes zero. Goals
    /// below `threshold` are dropped; ties keep declaration order (stable
    /// sort). The result is a total order, highest priority first.
    pub fn derive(&self, beliefs: &BeliefStore, floor: f32, threshold: f32) -> Vec<Goal> {
        let mut goals = Vec::new();
        for template in &self.templates {
            let mut weakest = 1.0f32;
            let mut support = Vec::with_capacity(template.requires.len());
            for dep in &template.requires {
                let belief = beliefs.get(&dep.belief);
                let confidence = if dep.expects.satisfied(belief, floor) {
                    // satisfied() guarantees the belief exists
                    belief.map(|b| b.confidence).unwrap_or(0.0)
                } else {
                    0.0
                };
                weakest = weakest.min(confidence);
                support.push((dep.belief.clone(), confidence));
            }

            let priority = template.base_weight * weakest;
            if priority < threshold {
                continue;
            }
            tracing::debug!(goal = %template.name, priority, "goal derived");
            goals.push(Goal {
                name: template.name.clone(),
                priority,
                support,
                capabilities: template.capabilities.clone(),
            });
        }
        goals.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        goals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{BeliefDecl, BeliefValue, Observation};

    fn store_with(beliefs: &[(&str, BeliefValue, f32)]) -> BeliefStore {
        let schema: Vec<BeliefDecl> = beliefs
            .iter()
            .map(|(name, value, _)| BeliefDecl {
                name: name.to_string(),
                kind: value.kind(),
                initial: value.clone(),
                initial_confidence: 0.0,
                decay_rate: None,
            })
            .collect();
        let mut store = BeliefStore::from_schema(&schema).unwrap();
        for (name, value, confidence) in beliefs {
            store
                .update(
                    &Observation {
                        name: name.to_string(),
                        value: value.clone(),
                        confidence: *confidence,
                        source: "test".into(),
                    },
                    1,
                    0.3,
                )
                .unwrap();
        }
        store
    }

    fn template(name: &str, weight: f32, requires: &[(&str, Expectation)]) -> GoalTemplate {
        GoalTemplate {
            name: name.into(),
            base_weight: weight,
            requires: requires
                .iter()
                .map(|(belief, expects)| GoalDependency {
                    belief: belief.to_string(),
                    expects: expects.clone(),
                })
                .collect(),
            capabilities: vec!["anticipatory_service".into()],
        }
    }

    #[test]
    fn weakest_link_caps_priority() {
        let store = store_with(&[
            ("special_occasion", BeliefValue::Categorical("anniversary".into()), 0.95),
            ("romantic_context", BeliefValue::Flag(true), 0.6),
        ]);
        let templates = GoalTemplates::load(vec![template(
            "create_memorable_experience",
            0.9,
            &[
                ("special_occasion", Expectation::Salient),
                ("romantic_context", Expectation::Salient),
            ],
        )])
        .unwrap();

        let goals = templates.derive(&store, 0.05, 0.15);
        assert_eq!(goals.len(), 1);
        // Priority never exceeds base_weight × min(dependency confidences).
        let expected = 0.9 * 0.6;
        assert!((goals[0].priority - expected).abs() < 1e-6);
    }

    #[test]
    fn unmet_expectation_drops_goal() {
        let store = store_with(&[(
            "special_occasion",
            BeliefValue::Categorical("unknown".into()),
            0.0,
        )]);
        let templates = GoalTemplates::load(vec![template(
            "create_memorable_experience",
            0.9,
            &[("special_occasion", Expectation::Salient)],
        )])
        .unwrap();
        assert!(templates.derive(&store, 0.05, 0.15).is_empty());
    }

    #[test]
    fn below_threshold_goals_are_dropped() {
        let store = store_with(&[("business_context", BeliefValue::Flag(true), 0.2)]);
        let templates = GoalTemplates::load(vec![template(
            "support_business_traveler",
            0.5,
            &[("business_context", Expectation::Salient)],
        )])
        .unwrap();
        // 0.5 × 0.2 = 0.1 < 0.15.
        assert!(templates.derive(&store, 0.05, 0.15).is_empty());
    }

    #[test]
    fn goals_sorted_by_priority_then_declaration_order() {
        let store = store_with(&[
            ("business_context", BeliefValue::Flag(true), 0.8),
            ("romantic_context", BeliefValue::Flag(true), 0.8),
        ]);
        let templates = GoalTemplates::load(vec![
            template(
                "first_declared",
                0.5,
                &[("business_context", Expectation::Salient)],
            ),
            template(
                "second_declared",
                0.5,
                &[("romantic_context", Expectation::Salient)],
            ),
            template(
                "strongest",
                0.9,
                &[("business_context", Expectation::Salient)],
            ),
        ])
        .unwrap();

        let goals = templates.derive(&store, 0.05, 0.15);
        assert_eq!(goals.len(), 3);
        assert_eq!(goals[0].name, "strongest");
        // Equal-priority tie keeps declaration order.
        assert_eq!(goals[1].name, "first_declared");
        assert_eq!(goals[2].name, "second_declared");
    }

    #[test]
    fn equals_expectation_matches_exact_value() {
        let store = store_with(&[(
            "special_occasion",
            BeliefValue::Categorical("anniversary".into()),
            0.95,
        )]);
        let templates = GoalTemplates::load(vec![
            template(
                "celebrate",
                0.9,
                &[(
                    "special_occasion",
                    Expectation::Equals(BeliefValue::Categorical("anniversary".into())),
                )],
            ),
            template(
                "console",
                0.9,
                &[(
                    "special_occasion",
                    Expectation::Equals(BeliefValue::Categorical("bereavement".into())),
                )],
            ),
        ])
        .unwrap();
        let goals = templates.derive(&store, 0.05, 0.15);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].name, "celebrate");
    }

    #[test]
    fn duplicate_goal_name_is_config_error() {
        let result = GoalTemplates::load(vec![
            template("same", 0.5, &[]),
            template("same", 0.6, &[]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn dependency_free_goal_uses_full_base_weight() {
        let store = store_with(&[]);
        let templates =
            GoalTemplates::load(vec![template("ambient_hospitality", 0.3, &[])]).unwrap();
        let goals = templates.derive(&store, 0.05, 0.15);
        assert_eq!(goals.len(), 1);
        assert!((goals[0].priority - 0.3).abs() < f32::EPSILON);
    }
}
