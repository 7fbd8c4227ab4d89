//! Bundled hospitality seed pack: the default belief schema, pattern
//! library, goal templates and tool registry for a hotel concierge
//! deployment.
//!
//! Deployments with their own domain model build these four collections
//! themselves; the pack here is a complete working configuration and the
//! one the integration scenarios run against.

use std::collections::BTreeMap;

use crate::belief::{BeliefDecl, BeliefValue, Expectation, ValueKind};
use crate::goal::{GoalDependency, GoalTemplate};
use crate::pattern::{Condition, Pattern, TriggerSpec, UpdateSpec};
use crate::select::ToolDescriptor;

/// Tool recommended when nothing clears the acceptance threshold.
pub const ESCALATION_TOOL: &str = "escalate_to_staff";

/// Default belief schema.
///
/// Stable identity facts override the decay rate to zero; situational
/// facts erode at the global rate.
pub fn belief_schema() -> Vec<BeliefDecl> {
    fn decl(
        name: &str,
        kind: ValueKind,
        initial: BeliefValue,
        decay_rate: Option<f32>,
    ) -> BeliefDecl {
        BeliefDecl {
            name: name.into(),
            kind,
            initial,
            initial_confidence: 0.0,
            decay_rate,
        }
    }
    let unknown = || BeliefValue::Categorical("unknown".into());
    vec![
        // Identity facts: never decay.
        decl("special_occasion", ValueKind::Categorical, unknown(), Some(0.0)),
        decl("dietary_preferences", ValueKind::Categorical, unknown(), Some(0.0)),
        decl("travel_purpose", ValueKind::Categorical, unknown(), Some(0.0)),
        decl(
            "business_context",
            ValueKind::Flag,
            BeliefValue::Flag(false),
            Some(0.0),
        ),
        // Situational facts: erode at the global rate unless noted.
        decl(
            "celebration_magnitude",
            ValueKind::Scalar,
            BeliefValue::Scalar(0.0),
            None,
        ),
        decl(
            "urgency_level",
            ValueKind::Scalar,
            BeliefValue::Scalar(0.0),
            // Urgency goes stale fast.
            Some(0.2),
        ),
        decl(
            "dissatisfaction",
            ValueKind::Flag,
            BeliefValue::Flag(false),
            Some(0.1),
        ),
        decl("arrival_pending", ValueKind::Flag, BeliefValue::Flag(false), None),
        decl("wellness_interest", ValueKind::Flag, BeliefValue::Flag(false), None),
    ]
}

/// Default situational patterns, broadest last.
pub fn patterns() -> Vec<Pattern> {
    fn set(belief: &str, value: BeliefValue, confidence: f32) -> UpdateSpec {
        UpdateSpec::Set {
            belief: belief.into(),
            value,
            confidence,
        }
    }
    fn keywords(any_of: &[&str]) -> Condition {
        Condition::Keyword {
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
        }
    }
    vec![
        Pattern {
            name: "anniversary_celebration".into(),
            conditions: vec![keywords(&["anniversary", "celebrating", "honeymoon"])],
            updates: vec![
                set(
                    "special_occasion",
                    BeliefValue::Categorical("anniversary".into()),
                    0.95,
                ),
                UpdateSpec::CaptureScalar {
                    belief: "celebration_magnitude".into(),
                    expression: r"(\d+)(?:st|nd|rd|th)?\s*(?:year|anniversary)".into(),
                    divisor: 25.0,
                    confidence: 0.9,
                },
            ],
            triggers: vec![TriggerSpec {
                kind: "notify_guest_services".into(),
                payload: BTreeMap::from([("occasion".into(), "anniversary".into())]),
            }],
            confidence: 1.0,
            failover: Some("generic_celebration".into()),
        },
        Pattern {
            name: "business_traveler".into(),
            conditions: vec![keywords(&[
                "conference",
                "meeting",
                "business trip",
                "work trip",
            ])],
            updates: vec![
                set("business_context", BeliefValue::Flag(true), 0.85),
                set(
                    "travel_purpose",
                    BeliefValue::Categorical("business".into()),
                    0.85,
                ),
            ],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        },
        Pattern {
            name: "dietary_disclosure".into(),
            conditions: vec![keywords(&[
                "vegetarian",
                "vegan",
                "gluten",
                "kosher",
                "halal",
                "allergy",
                "allergic",
            ])],
            updates: vec![set(
                "dietary_preferences",
                BeliefValue::Categorical("restricted".into()),
                0.9,
            )],
            triggers: vec![TriggerSpec {
                kind: "flag_dietary_needs".into(),
                payload: BTreeMap::new(),
            }],
            confidence: 1.0,
            failover: None,
        },
        Pattern {
            name: "service_complaint".into(),
            conditions: vec![keywords(&[
                "disappointed",
                "unacceptable",
                "complaint",
                "terrible",
                "not working",
            ])],
            updates: vec![
                set("dissatisfaction", BeliefValue::Flag(true), 0.9),
                set("urgency_level", BeliefValue::Scalar(0.8), 0.8),
            ],
            triggers: vec![TriggerSpec {
                kind: "alert_duty_manager".into(),
                payload: BTreeMap::new(),
            }],
            confidence: 1.0,
            failover: None,
        },
        Pattern {
            name: "wellness_inquiry".into(),
            conditions: vec![keywords(&["spa", "massage", "sauna", "wellness"])],
            updates: vec![set("wellness_interest", BeliefValue::Flag(true), 0.85)],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        },
        Pattern {
            name: "arrival_logistics".into(),
            conditions: vec![keywords(&[
                "check in",
                "checking in",
                "check-in",
                "early arrival",
                "late arrival",
            ])],
            updates: vec![set("arrival_pending", BeliefValue::Flag(true), 0.85)],
            triggers: vec![],
            confidence: 1.0,
            failover: None,
        },
        // Failover target for the anniversary pattern: records that some
        // celebration is happening even when the specific updates failed.
        Pattern {
            name: "generic_celebration".into(),
            conditions: vec![],
            updates: vec![set(
                "special_occasion",
                BeliefValue::Categorical("celebration".into()),
                0.6,
            )],
            triggers: vec![],
            confidence: 0.8,
            failover: None,
        },
    ]
}

/// Default goal templates, weighted by service priority.
pub fn goal_templates() -> Vec<GoalTemplate> {
    fn salient(belief: &str) -> GoalDependency {
        GoalDependency {
            belief: belief.into(),
            expects: Expectation::Salient,
        }
    }
    vec![
        GoalTemplate {
            name: "resolve_dissatisfaction".into(),
            base_weight: 1.0,
            requires: vec![salient("dissatisfaction")],
            capabilities: vec!["problem_resolution".into(), "service_coordination".into()],
        },
        GoalTemplate {
            name: "create_memorable_experience".into(),
            base_weight: 0.9,
            requires: vec![salient("special_occasion")],
            capabilities: vec![
                "reservation_making".into(),
                "anticipatory_service".into(),
                "recommendation".into(),
            ],
        },
        GoalTemplate {
            name: "accommodate_dietary_needs".into(),
            base_weight: 0.85,
            requires: vec![salient("dietary_preferences")],
            capabilities: vec!["recommendation".into(), "reservation_making".into()],
        },
        GoalTemplate {
            name: "ensure_smooth_arrival".into(),
            base_weight: 0.8,
            requires: vec![salient("arrival_pending")],
            capabilities: vec!["logistics".into(), "service_coordination".into()],
        },
        GoalTemplate {
            name: "support_business_needs".into(),
            base_weight: 0.7,
            requires: vec![salient("business_context")],
            capabilities: vec!["information_retrieval".into(), "logistics".into()],
        },
        GoalTemplate {
            name: "promote_wellbeing".into(),
            base_weight: 0.6,
            requires: vec![salient("wellness_interest")],
            capabilities: vec!["reservation_making".into(), "recommendation".into()],
        },
    ]
}

/// Default tool registry.
pub fn tools() -> Vec<ToolDescriptor> {
    fn tool(
        name: &str,
        description: &str,
        affordances: &[(&str, f32)],
        preconditions: &[&str],
    ) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: description.into(),
            affordances: affordances
                .iter()
                .map(|(dim, strength)| (dim.to_string(), *strength))
                .collect(),
            preconditions: preconditions.iter().map(|s| s.to_string()).collect(),
        }
    }
    vec![
        tool(
            "property_info",
            "answers questions about amenities, hours, and hotel services",
            &[("information_retrieval", 0.95), ("recommendation", 0.3)],
            &[],
        ),
        tool(
            "recommendations",
            "suggests dining, activities, and local experiences",
            &[
                ("recommendation", 0.95),
                ("anticipatory_service", 0.6),
                ("information_retrieval", 0.4),
            ],
            &["travel_purpose"],
        ),
        tool(
            "reservation",
            "books restaurants, tables, and celebration arrangements",
            &[
                ("reservation_making", 0.95),
                ("service_coordination", 0.8),
                ("anticipatory_service", 0.7),
            ],
            &["special_occasion"],
        ),
        tool(
            "spa_services",
            "books spa treatments and wellness sessions",
            &[
                ("reservation_making", 0.8),
                ("recommendation", 0.5),
                ("anticipatory_service", 0.6),
            ],
            &["wellness_interest"],
        ),
        tool(
            "checkin_checkout",
            "handles arrival and departure logistics, room changes, and billing",
            &[("logistics", 0.95), ("service_coordination", 0.7)],
            &["arrival_pending"],
        ),
        tool(
            ESCALATION_TOOL,
            "hands the conversation to a human concierge",
            &[
                ("problem_resolution", 0.95),
                ("service_coordination", 0.9),
            ],
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalTemplates;
    use crate::pattern::PatternLibrary;
    use crate::select::ToolRegistry;

    #[test]
    fn bundled_pack_loads_cleanly() {
        crate::belief::BeliefStore::from_schema(&belief_schema()).unwrap();
        PatternLibrary::load(patterns()).unwrap();
        GoalTemplates::load(goal_templates()).unwrap();
        ToolRegistry::load(tools(), Some(ESCALATION_TOOL.into())).unwrap();
    }

    #[test]
    fn every_goal_capability_is_covered_by_some_tool() {
        let tools = tools();
        for template in goal_templates() {
            for capability in &template.capabilities {
                assert!(
                    tools.iter().any(|t| t.affordances.contains_key(capability)),
                    "no tool affords \"{capability}\""
                );
            }
        }
    }

    #[test]
    fn every_pattern_update_targets_a_declared_belief() {
        let declared: Vec<String> = belief_schema().into_iter().map(|d| d.name).collect();
        for pattern in patterns() {
            for update in &pattern.updates {
                let belief = match update {
                    UpdateSpec::Set { belief, .. } => belief,
                    UpdateSpec::CaptureScalar { belief, .. } => belief,
                };
                assert!(
                    declared.contains(belief),
                    "pattern \"{}\" updates undeclared belief \"{belief}\"",
                    pattern.name
                );
            }
        }
    }
}
