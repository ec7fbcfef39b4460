//! Workflow configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! session_timeout_ms = 30000
//! finality_timeout_ms = 60000
//! time_window_secs = 300
//! responder_policy = "verify-contract"
//! max_amount = "1000000"
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::policy::{AcceptAll, AllOf, MaxAmount, RejectAll, ValidationPolicy, VerifyContract};

/// Longest validity window a draft may carry (30 days).
pub const MAX_TIME_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which checks a responder applies before endorsing a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Endorse anything that passes the structural checks.
    AcceptAll,
    /// Run the contract rules against the proposal.
    #[default]
    VerifyContract,
    /// Decline every proposal.
    RejectAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// How long to wait for a counterparty's reply to a proposal.
    pub session_timeout_ms: u64,
    /// How long to wait for a finalized transaction or its acknowledgement.
    pub finality_timeout_ms: u64,
    /// Length of the validity window stamped on every draft.
    pub time_window_secs: u64,
    pub responder_policy: PolicyKind,
    /// Upper bound on any output amount a responder will endorse.
    pub max_amount: Option<Decimal>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: 30_000,
            finality_timeout_ms: 60_000,
            time_window_secs: 300,
            responder_policy: PolicyKind::default(),
            max_amount: None,
        }
    }
}

impl FlowConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "session_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.finality_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "finality_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.time_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "time_window_secs must be greater than zero".into(),
            ));
        }
        if self.time_window_secs > MAX_TIME_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "time_window_secs must be at most {}",
                MAX_TIME_WINDOW_SECS
            )));
        }
        if let Some(limit) = self.max_amount {
            if limit <= Decimal::ZERO {
                return Err(ConfigError::Invalid("max_amount must be positive".into()));
            }
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }

    pub fn time_window(&self) -> Duration {
        Duration::from_secs(self.time_window_secs)
    }

    /// The responder policy this configuration describes. A `max_amount`
    /// is layered on top of the base policy.
    pub fn build_policy(&self) -> Arc<dyn ValidationPolicy> {
        let base: Arc<dyn ValidationPolicy> = match self.responder_policy {
            PolicyKind::AcceptAll => Arc::new(AcceptAll),
            PolicyKind::VerifyContract => Arc::new(VerifyContract),
            PolicyKind::RejectAll => Arc::new(RejectAll::default()),
        };
        match self.max_amount {
            Some(limit) => Arc::new(AllOf::new(vec![base, Arc::new(MaxAmount::new(limit))])),
            None => base,
        }
    }
}
