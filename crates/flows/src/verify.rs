use covenant_ledger::{Contract, LedgerTransaction, TransactionBuilder};

use crate::error::FlowError;

/// Run the contract rules against a draft before anyone is asked to sign it.
/// No I/O happens here.
pub fn verify_locally(
    contract: &dyn Contract,
    builder: &TransactionBuilder,
) -> Result<LedgerTransaction, FlowError> {
    let ltx = builder.to_ledger_transaction();
    contract.verify(&ltx)?;
    Ok(ltx)
}
