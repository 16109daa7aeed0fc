//! Transaction control gates.
//!
//! The only plain gates in the system: they need out-of-band access to the
//! runner's snapshot capability. BEGIN captures, ROLLBACK restores, COMMIT
//! discards.

use quarry_stream::{Event, PlainGate, TxnContext};
use quarry_types::Result;

pub(crate) struct BeginGate;

impl PlainGate for BeginGate {
    fn signature(&self) -> &'static str {
        "transaction_begin"
    }

    fn handle(&self, _event: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>> {
        ctx.begin()?;
        Ok(vec![Event::TransactionStarted])
    }
}

pub(crate) struct CommitGate;

impl PlainGate for CommitGate {
    fn signature(&self) -> &'static str {
        "transaction_commit"
    }

    fn handle(&self, _event: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>> {
        ctx.commit()?;
        Ok(vec![Event::TransactionCommitted])
    }
}

pub(crate) struct RollbackGate;

impl PlainGate for RollbackGate {
    fn signature(&self) -> &'static str {
        "transaction_rollback"
    }

    fn handle(&self, _event: &Event, ctx: &mut dyn TxnContext) -> Result<Vec<Event>> {
        ctx.rollback()?;
        Ok(vec![Event::TransactionRolledBack])
    }
}
