//! Network description for `covenant simulate`.
//!
//! # Example
//!
//! ```toml
//! [flow]
//! session_timeout_ms = 5000
//! responder_policy = "verify-contract"
//!
//! [[notaries]]
//! name = "Notary"
//!
//! [[parties]]
//! name = "Alice"
//! key_file = "keys/alice.secret"
//!
//! [[parties]]
//! name = "Bob"
//!
//! [[parties]]
//! name = "Carol"
//! policy = "reject-all"
//!
//! [[steps]]
//! kind = "issue"
//! lender = "Alice"
//! borrower = "Bob"
//! amount = "100.00 USD"
//! external_id = "IOU-1"
//!
//! [[steps]]
//! kind = "transfer"
//! lender = "Alice"
//! new_lender = "Carol"
//! record = "IOU-1"
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use covenant_flows::{FlowConfig, PolicyKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Settings shared by every node.
    #[serde(default)]
    pub flow: FlowConfig,
    pub notaries: Vec<NotaryConfig>,
    pub parties: Vec<PartyConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryConfig {
    pub name: String,
    /// Secret key written by `covenant keygen`. Generated when absent.
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    pub key_file: Option<PathBuf>,
    /// Overrides `flow.responder_policy` for this party.
    pub policy: Option<PolicyKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepConfig {
    Issue {
        lender: String,
        borrower: String,
        amount: String,
        external_id: Option<String>,
    },
    Transfer {
        lender: String,
        new_lender: String,
        /// External id given to an earlier issue step.
        record: String,
    },
}

/// Read and parse a network description from `path`.
///
/// Relative key paths are resolved against the file's directory.
pub fn read_network_config(path: &Path) -> Result<NetworkConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let mut config: NetworkConfig = toml::from_str(&content)
        .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let key_files = config
        .notaries
        .iter_mut()
        .map(|n| &mut n.key_file)
        .chain(config.parties.iter_mut().map(|p| &mut p.key_file));
    for key_file in key_files.flatten() {
        if key_file.is_relative() {
            *key_file = base.join(&*key_file);
        }
    }
    Ok(config)
}

/// Check the description is internally consistent.
///
/// Returns every problem found rather than stopping at the first.
pub fn validate_network_config(config: &NetworkConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    if let Err(e) = config.flow.validate() {
        errors.push(format!("[flow]: {}", e));
    }
    if config.notaries.is_empty() {
        errors.push("at least one [[notaries]] entry is required".to_string());
    }

    let mut names = BTreeSet::new();
    for name in config
        .notaries
        .iter()
        .map(|n| &n.name)
        .chain(config.parties.iter().map(|p| &p.name))
    {
        if !names.insert(name.as_str()) {
            errors.push(format!("name '{}' is used more than once", name));
        }
    }
    let parties: BTreeSet<&str> = config.parties.iter().map(|p| p.name.as_str()).collect();

    let mut issued = BTreeSet::new();
    for (i, step) in config.steps.iter().enumerate() {
        let n = i + 1;
        let named = match step {
            StepConfig::Issue {
                lender,
                borrower,
                external_id,
                ..
            } => {
                if let Some(id) = external_id {
                    if !issued.insert(id.as_str()) {
                        errors.push(format!("step {}: external id '{}' is issued twice", n, id));
                    }
                }
                vec![lender, borrower]
            }
            StepConfig::Transfer {
                lender,
                new_lender,
                record,
            } => {
                if !issued.contains(record.as_str()) {
                    errors.push(format!(
                        "step {}: record '{}' is not issued by an earlier step",
                        n, record
                    ));
                }
                vec![lender, new_lender]
            }
        };
        for name in named {
            if !parties.contains(name.as_str()) {
                errors.push(format!("step {}: unknown party '{}'", n, name));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
