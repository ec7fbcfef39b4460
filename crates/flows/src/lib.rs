//! Covenant endorsement workflows.
//!
//! An initiator builds a draft transaction, verifies it against the contract
//! rules, signs it and sends it to every other required signer. Each
//! counterparty runs a responder that validates the draft and endorses or
//! rejects it. Once every signature is in, the draft's notary orders it and
//! the finalized transaction is recorded in every participant's vault.
//!
//! All endorsement is unanimous. One rejection, timeout or protocol fault
//! aborts the whole run and nothing reaches the notary.
//!
//! Services a flow needs (keys, clock, vault, directory, notaries and
//! transport) are passed in a [`ServiceHub`]; this crate ships in-memory
//! implementations of each so a whole network can run inside one process.

pub mod builder;
pub mod cancel;
pub mod clock;
pub mod collect;
pub mod config;
pub mod error;
pub mod finality;
pub mod hub;
pub mod initiator;
pub mod keys;
pub mod network;
pub mod node;
pub mod notary;
pub mod policy;
pub mod progress;
pub mod registry;
pub mod responder;
pub mod session;
pub mod vault;
pub mod verify;

pub use builder::{first_notary, lookup_by_linear_id, ProposalBuilder};
pub use cancel::CancellationToken;
pub use clock::{Clock, FixedClock, SystemClock};
pub use collect::collect_signatures;
pub use config::{ConfigError, FlowConfig, PolicyKind};
pub use error::{ErrorKind, FlowError};
pub use finality::finalize;
pub use hub::ServiceHub;
pub use initiator::{IssueFlow, TransferFlow, ISSUE_FLOW, TRANSFER_FLOW};
pub use keys::{KeyManagementService, LocalKeyStore};
pub use network::{IdentityDirectory, InMemoryNetwork, NetworkMap, SessionAcceptor, Transport};
pub use node::Node;
pub use notary::{InMemoryNotary, NotaryError, NotaryService, OrderingResolver};
pub use progress::{ProgressStep, ProgressTracker};
pub use registry::{signer_factory, ResponderFactory, ResponderFuture, ResponderRegistry};
pub use responder::{ResponderOutcome, ResponderState, SignTransactionResponder};
pub use session::{FlowMessage, FlowSession, SessionId};
pub use verify::verify_locally;
