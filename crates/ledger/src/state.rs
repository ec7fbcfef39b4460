//! Records held in vaults and the references that point at them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Amount;
use crate::crypto::SecureHash;
use crate::error::LedgerError;
use crate::identity::{Party, PublicKey};

/// Stable logical identity of a record across all of its versions.
///
/// Rendered as `<external_id>_<uuid>` when an external id is present,
/// otherwise as the bare UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueIdentifier {
    pub external_id: Option<String>,
    pub id: Uuid,
}

impl UniqueIdentifier {
    pub fn new(external_id: Option<String>) -> Self {
        Self {
            external_id,
            id: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external_id {
            Some(external) => write!(f, "{}_{}", external, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

impl FromStr for UniqueIdentifier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(Self {
                external_id: None,
                id,
            });
        }
        let (external, uuid) = s
            .rsplit_once('_')
            .ok_or_else(|| LedgerError::InvalidIdentifier(s.to_string()))?;
        let id = Uuid::parse_str(uuid).map_err(|_| LedgerError::InvalidIdentifier(s.to_string()))?;
        Ok(Self {
            external_id: Some(external.to_string()),
            id,
        })
    }
}

/// Pointer to one output of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: SecureHash,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

/// An IOU: the borrower owes `amount` to the lender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub amount: Amount,
    pub lender: Party,
    pub borrower: Party,
    pub linear_id: UniqueIdentifier,
}

impl Obligation {
    pub fn new(amount: Amount, lender: Party, borrower: Party, external_id: Option<String>) -> Self {
        Self {
            amount,
            lender,
            borrower,
            linear_id: UniqueIdentifier::new(external_id),
        }
    }

    pub fn participants(&self) -> [&Party; 2] {
        [&self.lender, &self.borrower]
    }

    pub fn participant_keys(&self) -> BTreeSet<PublicKey> {
        self.participants().iter().map(|p| p.owning_key).collect()
    }

    /// The next version of this record, owed to `lender` instead.
    pub fn with_new_lender(&self, lender: Party) -> Self {
        Self {
            lender,
            ..self.clone()
        }
    }
}

/// A record as it sits inside a transaction, bound to the notary that
/// orders any transaction consuming it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub data: Obligation,
    pub notary: Party,
}

/// A record together with the reference of its current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: TransactionState,
    pub reference: StateRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_with_external_id_roundtrips_through_display() {
        let id = UniqueIdentifier::new(Some("X-1".to_string()));
        let parsed: UniqueIdentifier = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn identifier_with_underscored_external_id() {
        let id = UniqueIdentifier::new(Some("trial_site_7".to_string()));
        let parsed: UniqueIdentifier = id.to_string().parse().unwrap();
        assert_eq!(parsed.external_id.as_deref(), Some("trial_site_7"));
    }

    #[test]
    fn bare_uuid_parses_without_external_id() {
        let id = UniqueIdentifier::new(None);
        let parsed: UniqueIdentifier = id.to_string().parse().unwrap();
        assert_eq!(parsed.external_id, None);
        assert_eq!(parsed.id, id.id);
    }

    #[test]
    fn garbage_identifier_is_rejected() {
        assert!("not-an-id".parse::<UniqueIdentifier>().is_err());
    }
}
