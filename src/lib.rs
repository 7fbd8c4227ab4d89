//! # concierge-core
//!
//! The decision core of a conversational service agent: confidence-weighted
//! beliefs, declarative situation patterns, derived goals, and explainable
//! tool selection.
//!
//! ## Architecture
//!
//! - **Belief store** (`belief`): per-session confidence-weighted facts with
//!   turn-based decay
//! - **Pattern matcher** (`pattern`): declarative rules staging belief
//!   updates and abstract triggers
//! - **Goal deriver** (`goal`): weakest-link goal activation from belief
//!   confidence
//! - **Tool selector** (`select`): affordance scoring with per-candidate
//!   rationale, oracle-assisted when available
//! - **Sessions** (`session`): turn pipeline and concurrent session
//!   management
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use concierge_core::config::CoreConfig;
//! use concierge_core::goal::GoalTemplates;
//! use concierge_core::pattern::PatternLibrary;
//! use concierge_core::select::ToolRegistry;
//! use concierge_core::session::{SessionManager, TurnContext};
//! use concierge_core::seeds;
//!
//! let manager = SessionManager::new(
//!     CoreConfig::default(),
//!     &seeds::belief_schema(),
//!     Arc::new(PatternLibrary::load(seeds::patterns()).unwrap()),
//!     Arc::new(GoalTemplates::load(seeds::goal_templates()).unwrap()),
//!     Arc::new(ToolRegistry::load(seeds::tools(), Some(seeds::ESCALATION_TOOL.into())).unwrap()),
//!     None,
//! )
//! .unwrap();
//! let record = manager
//!     .process_turn("guest-1", "we're celebrating our 10th anniversary", &TurnContext::default())
//!     .unwrap();
//! println!("{:?}", record.selection);
//! ```

pub mod belief;
pub mod config;
pub mod error;
pub mod goal;
pub mod oracle;
pub mod pattern;
pub mod seeds;
pub mod select;
pub mod session;
pub mod trace;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use session::{DecisionRecord, SessionManager, TurnContext};
