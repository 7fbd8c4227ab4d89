//! Affordance-scoring oracle boundary.
//!
//! The oracle is an optional external service that judges semantic
//! similarity between a tool's affordance description and a goal. It is
//! the one legitimate suspension point per turn: calls carry a bounded
//! timeout, and any failure or timeout degrades the selector to static
//! scoring rather than failing the turn.

use crate::config::CoreConfig;
use crate::error::OracleError;

/// External scoring oracle for tool/goal semantic similarity.
///
/// Implementations must return a score in [0, 1]. The selector treats any
/// error as a signal to fall back to static affordance scoring.
pub trait AffordanceOracle: Send + Sync {
    fn similarity(&self, tool_description: &str, goal_name: &str) -> Result<f32, OracleError>;
}

/// Configuration for the HTTP oracle client.
#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    /// Base URL for the scoring API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".into(),
            timeout_secs: 5,
        }
    }
}

impl HttpOracleConfig {
    /// Build an oracle config that honors the core's per-call budget.
    pub fn from_core(config: &CoreConfig, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: config.oracle_timeout_secs,
        }
    }
}

/// Client for an HTTP affordance-scoring service.
///
/// POSTs `{"tool": ..., "goal": ...}` to `{base_url}/score` and expects
/// `{"score": <float in [0,1]>}` back.
pub struct HttpOracle {
    config: HttpOracleConfig,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Self {
        Self { config }
    }
}

impl AffordanceOracle for HttpOracle {
    fn similarity(&self, tool_description: &str, goal_name: &str) -> Result<f32, OracleError> {
        let url = format!("{}/score", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let body = serde_json::json!({
            "tool": tool_description,
            "goal": goal_name,
        });
        let body_str = serde_json::to_string(&body).map_err(|e| OracleError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| {
                let message = e.to_string();
                if message.contains("timed out") {
                    OracleError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    OracleError::RequestFailed { message }
                }
            })?;

        let resp_str = resp.into_string().map_err(|e| OracleError::ParseError {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| OracleError::ParseError {
                message: e.to_string(),
            })?;

        let score = json["score"]
            .as_f64()
            .ok_or_else(|| OracleError::ParseError {
                message: "missing 'score' field".into(),
            })? as f32;

        if !(0.0..=1.0).contains(&score) || !score.is_finite() {
            return Err(OracleError::ScoreOutOfRange { score });
        }
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_config_inherits_core_budget() {
        let core = CoreConfig {
            oracle_timeout_secs: 2,
            ..CoreConfig::default()
        };
        let config = HttpOracleConfig::from_core(&core, "http://oracle.internal:8090");
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.base_url, "http://oracle.internal:8090");
    }

    #[test]
    fn unreachable_oracle_reports_request_failure() {
        // Port 9 (discard) is not serving HTTP; the client must surface an
        // error, never panic or hang past the timeout.
        let oracle = HttpOracle::new(HttpOracleConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        });
        let err = oracle
            .similarity("books restaurant tables", "create_memorable_experience")
            .unwrap_err();
        assert!(matches!(
            err,
            OracleError::RequestFailed { .. } | OracleError::Timeout { .. }
        ));
    }
}
