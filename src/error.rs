//! Rich diagnostic error types for the concierge decision core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so operators know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the decision core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Belief(#[from] BeliefError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// Configuration errors — fatal at load, never recovered silently
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid {field}: {value} (expected {expected})")]
    #[diagnostic(
        code(concierge::config::out_of_range),
        help(
            "The named configuration field is outside its valid range. \
             Fix the value in the configuration and reload."
        )
    )]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("configuration parse error: {message}")]
    #[diagnostic(
        code(concierge::config::parse),
        help("The configuration document is not valid TOML for this schema.")
    )]
    Parse { message: String },

    #[error("duplicate {kind} declaration: \"{name}\"")]
    #[diagnostic(
        code(concierge::config::duplicate),
        help("Names must be unique within a registry. Remove or rename the duplicate entry.")
    )]
    Duplicate { kind: &'static str, name: String },

    #[error("escalation capability \"{name}\" is not a registered tool")]
    #[diagnostic(
        code(concierge::config::unknown_escalation),
        help("The escalation recommendation must name a tool declared in the same registry.")
    )]
    UnknownEscalation { name: String },

    #[error("pattern \"{pattern}\" declares unknown failover \"{failover}\"")]
    #[diagnostic(
        code(concierge::config::unknown_failover),
        help(
            "Every failover must name another pattern in the same library. \
             Add the missing pattern or remove the failover reference."
        )
    )]
    UnknownFailover { pattern: String, failover: String },

    #[error("pattern \"{pattern}\" has invalid capture expression: {message}")]
    #[diagnostic(
        code(concierge::config::bad_capture),
        help(
            "Scalar-capture updates need a valid regex with one numeric capture group, \
             e.g. `(\\d+)(?:st|nd|rd|th)?\\s*anniversary`."
        )
    )]
    BadCapture { pattern: String, message: String },

    #[error("tool \"{tool}\" affordance \"{dimension}\" is {value} (expected [0,1])")]
    #[diagnostic(
        code(concierge::config::bad_affordance),
        help("Affordance strengths are bounded scalars. Clamp or correct the profile entry.")
    )]
    BadAffordance {
        tool: String,
        dimension: String,
        value: f32,
    },

    #[error("tool registry is empty")]
    #[diagnostic(
        code(concierge::config::empty_registry),
        help(
            "A decision core without tools cannot select anything. \
             Declare at least one tool (including the escalation capability) before starting sessions."
        )
    )]
    EmptyToolRegistry,
}

// ---------------------------------------------------------------------------
// Belief store errors — per-update validation, skipped not fatal
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BeliefError {
    #[error("unknown belief: \"{name}\"")]
    #[diagnostic(
        code(concierge::belief::unknown),
        help(
            "Beliefs must be declared in the store's schema before they can be updated. \
             Check the belief name against the declared schema."
        )
    )]
    Unknown { name: String },

    #[error("confidence {confidence} out of range for belief \"{name}\"")]
    #[diagnostic(
        code(concierge::belief::confidence_range),
        help("Confidence must lie in [0.0, 1.0].")
    )]
    ConfidenceOutOfRange { name: String, confidence: f32 },

    #[error("value kind mismatch for belief \"{name}\": declared {declared}, got {got}")]
    #[diagnostic(
        code(concierge::belief::kind_mismatch),
        help(
            "A belief keeps the value kind it was declared with. \
             Update it with a categorical, flag, or scalar value matching the declaration."
        )
    )]
    KindMismatch {
        name: String,
        declared: &'static str,
        got: &'static str,
    },

    #[error("scalar value {value} out of range for belief \"{name}\"")]
    #[diagnostic(
        code(concierge::belief::scalar_range),
        help("Scalar belief values are bounded to [0.0, 1.0].")
    )]
    ScalarOutOfRange { name: String, value: f32 },
}

// ---------------------------------------------------------------------------
// Oracle errors — recovered locally by static fallback
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("oracle request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(concierge::oracle::timeout),
        help(
            "The affordance-scoring oracle did not respond within the configured budget. \
             The selector falls back to static scoring; increase the timeout if this recurs."
        )
    )]
    Timeout { timeout_secs: u64 },

    #[error("oracle request failed: {message}")]
    #[diagnostic(
        code(concierge::oracle::request_failed),
        help("Check that the scoring service is reachable at the configured URL.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse oracle response: {message}")]
    #[diagnostic(
        code(concierge::oracle::parse_error),
        help("The scoring service returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("oracle returned score {score} outside [0,1]")]
    #[diagnostic(
        code(concierge::oracle::score_range),
        help("Similarity scores must be bounded. The response is discarded.")
    )]
    ScoreOutOfRange { score: f32 },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("session \"{session_id}\" state corrupted: {message}")]
    #[diagnostic(
        code(concierge::session::corrupted),
        help(
            "The session's belief store was observed in an inconsistent state. \
             The session has been torn down; the next turn starts from a fresh store. \
             Explain the loss of conversational continuity to the user."
        )
    )]
    Corrupted { session_id: String, message: String },

    #[error("session \"{session_id}\" is mid-turn")]
    #[diagnostic(
        code(concierge::session::busy),
        help(
            "A session processes one turn at a time. Wait for the in-flight turn \
             to complete before submitting the next utterance."
        )
    )]
    Busy { session_id: String },
}

/// Convenience alias for functions returning decision-core results.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
