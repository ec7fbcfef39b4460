//! `covenant simulate`: run issue and transfer steps across an in-process
//! network described by a TOML file.

pub mod network_config;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use covenant_flows::vault::{finalized_transactions, unconsumed_states};
use covenant_flows::{
    Clock, FlowConfig, InMemoryNetwork, InMemoryNotary, KeyManagementService, LocalKeyStore,
    NetworkMap, Node, ServiceHub, SystemClock,
};
use covenant_ledger::{Amount, FinalizedTransaction, IouContract, Party, UniqueIdentifier};
use covenant_storage::InMemoryVault;
use serde::Serialize;
use tracing::{info, warn};

use crate::keygen::read_secret_key;
use crate::OutputFormat;
use network_config::{read_network_config, validate_network_config, NetworkConfig, StepConfig};

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub kind: &'static str,
    pub initiator: String,
    pub transaction: FinalizedTransaction,
}

#[derive(Debug, Serialize)]
pub struct Holding {
    pub linear_id: String,
    pub amount: String,
    pub lender: String,
    pub borrower: String,
}

#[derive(Debug, Serialize)]
pub struct VaultSummary {
    pub party: String,
    pub transactions: usize,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub vaults: Vec<VaultSummary>,
}

fn load_keys(name: &str, key_file: Option<&Path>) -> Result<Arc<LocalKeyStore>, String> {
    match key_file {
        Some(path) => read_secret_key(path).map(Arc::new),
        None => {
            info!(party = name, "no key file given, generating a key");
            Ok(Arc::new(LocalKeyStore::generate()))
        }
    }
}

struct Simulation {
    nodes: BTreeMap<String, Node<InMemoryVault>>,
    issued: BTreeMap<String, UniqueIdentifier>,
}

impl Simulation {
    fn build(config: &NetworkConfig) -> Result<Self, String> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let map = Arc::new(NetworkMap::new());
        let transport = InMemoryNetwork::new();

        for notary in &config.notaries {
            let keys = load_keys(&notary.name, notary.key_file.as_deref())?;
            map.add_notary(Arc::new(InMemoryNotary::new(
                &notary.name,
                keys,
                clock.clone(),
            )));
        }

        let mut nodes = BTreeMap::new();
        for party in &config.parties {
            let keys = load_keys(&party.name, party.key_file.as_deref())?;
            let identity = Party::new(party.name.clone(), keys.public_key());
            map.add_party(identity.clone());
            let node_config = FlowConfig {
                responder_policy: party.policy.unwrap_or(config.flow.responder_policy),
                ..config.flow.clone()
            };
            let policy = node_config.build_policy();
            let hub = ServiceHub {
                identity,
                keys,
                clock: clock.clone(),
                vault: Arc::new(InMemoryVault::new()),
                directory: map.clone(),
                ordering: map.clone(),
                transport: transport.clone(),
                contract: Arc::new(IouContract),
                config: node_config,
            };
            let node = Node::new(hub, &transport);
            info!(party = %party.name, policy = policy.name(), "node started");
            node.register_iou_responders(policy);
            nodes.insert(party.name.clone(), node);
        }

        Ok(Self {
            nodes,
            issued: BTreeMap::new(),
        })
    }

    fn node(&self, name: &str) -> Result<&Node<InMemoryVault>, String> {
        self.nodes
            .get(name)
            .ok_or_else(|| format!("unknown party '{}'", name))
    }

    async fn run_step(&mut self, n: usize, step: &StepConfig) -> Result<StepReport, String> {
        let (kind, initiator, result) = match step {
            StepConfig::Issue {
                lender,
                borrower,
                amount,
                external_id,
            } => {
                let amount = Amount::parse(amount).map_err(|e| format!("step {}: {}", n, e))?;
                let node = self.node(lender)?;
                let result = node.issue(amount, borrower, external_id.clone()).await;
                if let (Ok(ftx), Some(id)) = (&result, external_id) {
                    if let Some(iou) = ftx.transaction.tx.outputs.first() {
                        self.issued.insert(id.clone(), iou.linear_id.clone());
                    }
                }
                ("issue", lender, result)
            }
            StepConfig::Transfer {
                lender,
                new_lender,
                record,
            } => {
                let linear_id = self
                    .issued
                    .get(record)
                    .ok_or_else(|| format!("step {}: record '{}' was never issued", n, record))?;
                let result = self.node(lender)?.transfer(linear_id, new_lender).await;
                ("transfer", lender, result)
            }
        };
        self.settle().await;

        let transaction = result.map_err(|e| format!("step {}: {} failed: {}", n, kind, e))?;
        info!(step = n, kind, tx_id = %transaction.id(), sequence = transaction.sequence, "step finalized");
        Ok(StepReport {
            step: n,
            kind,
            initiator: initiator.clone(),
            transaction,
        })
    }

    /// Wait for every responder to finish so vaults are settled.
    async fn settle(&self) {
        for (name, node) in &self.nodes {
            for outcome in node.drain_responders().await {
                if let Err(e) = outcome {
                    warn!(party = %name, error = %e, "responder failed");
                }
            }
        }
    }

    async fn summarise(&self) -> Result<Vec<VaultSummary>, String> {
        let mut summaries = Vec::with_capacity(self.nodes.len());
        for (name, node) in &self.nodes {
            let transactions = finalized_transactions(node.vault())
                .await
                .map_err(|e| e.to_string())?
                .len();
            let holdings = unconsumed_states(node.vault())
                .await
                .map_err(|e| e.to_string())?
                .into_iter()
                .map(|s| Holding {
                    linear_id: s.state.data.linear_id.to_string(),
                    amount: s.state.data.amount.to_string(),
                    lender: s.state.data.lender.name,
                    borrower: s.state.data.borrower.name,
                })
                .collect();
            summaries.push(VaultSummary {
                party: name.clone(),
                transactions,
                holdings,
            });
        }
        Ok(summaries)
    }
}

pub async fn run_simulation(config: &NetworkConfig) -> Result<SimulationReport, String> {
    let mut simulation = Simulation::build(config)?;
    let mut steps = Vec::with_capacity(config.steps.len());
    for (i, step) in config.steps.iter().enumerate() {
        steps.push(simulation.run_step(i + 1, step).await?);
    }
    Ok(SimulationReport {
        steps,
        vaults: simulation.summarise().await?,
    })
}

fn print_text(report: &SimulationReport) {
    for step in &report.steps {
        let tx = &step.transaction;
        println!(
            "step {}: {} by {} finalized as {} (sequence {}, {} signature(s))",
            step.step,
            step.kind,
            step.initiator,
            tx.id().short(),
            tx.sequence,
            tx.transaction.sigs().len()
        );
    }
    for vault in &report.vaults {
        println!(
            "{}: {} transaction(s), {} unconsumed record(s)",
            vault.party,
            vault.transactions,
            vault.holdings.len()
        );
        for h in &vault.holdings {
            println!(
                "  {} {} owed by {} to {}",
                h.linear_id, h.amount, h.borrower, h.lender
            );
        }
    }
}

pub fn cmd_simulate(path: &Path, output: OutputFormat, quiet: bool) {
    let config = match read_network_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(errors) = validate_network_config(&config) {
        for e in &errors {
            eprintln!("error: {}", e);
        }
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let report = match rt.block_on(run_simulation(&config)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize report: {}", e);
                std::process::exit(1);
            }
        },
        OutputFormat::Text => {
            if !quiet {
                print_text(&report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_flows::PolicyKind;

    fn config(steps: &str) -> NetworkConfig {
        let toml = format!(
            r#"
[[notaries]]
name = "Notary"

[[parties]]
name = "Alice"

[[parties]]
name = "Bob"

[[parties]]
name = "Carol"

{steps}
"#
        );
        toml::from_str(&toml).unwrap()
    }

    #[tokio::test]
    async fn issue_then_transfer_settles_every_vault() {
        let config = config(
            r#"
[[steps]]
kind = "issue"
lender = "Alice"
borrower = "Bob"
amount = "100.00 USD"
external_id = "IOU-1"

[[steps]]
kind = "transfer"
lender = "Alice"
new_lender = "Carol"
record = "IOU-1"
"#,
        );
        let report = run_simulation(&config).await.unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].transaction.sequence, 1);
        assert_eq!(report.steps[1].transaction.sequence, 2);
        assert_eq!(report.steps[1].transaction.transaction.sigs().len(), 3);

        let by_party: BTreeMap<&str, &VaultSummary> =
            report.vaults.iter().map(|v| (v.party.as_str(), v)).collect();
        assert_eq!(by_party["Alice"].transactions, 2);
        assert!(by_party["Alice"].holdings.is_empty());
        assert_eq!(by_party["Bob"].holdings.len(), 1);
        assert_eq!(by_party["Carol"].holdings[0].lender, "Carol");
        assert_eq!(by_party["Carol"].transactions, 1);
    }

    #[tokio::test]
    async fn rejecting_party_fails_the_step() {
        let mut config = config(
            r#"
[[steps]]
kind = "issue"
lender = "Alice"
borrower = "Bob"
amount = "5 USD"
"#,
        );
        config.parties[1].policy = Some(PolicyKind::RejectAll);
        let err = run_simulation(&config).await.unwrap_err();
        assert!(err.starts_with("step 1: issue failed"), "{err}");
        assert!(err.contains("rejected"), "{err}");
    }
}
