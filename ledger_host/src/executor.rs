use std::sync::{Mutex, MutexGuard, PoisonError};

use cid::Cid;
use fungible_ledger::ledger::types::ConstructorParams;
use fungible_ledger::LedgerEvent;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::MethodNum;

use crate::{HostError, LedgerActor, Receipt};

struct Inner<BS: Blockstore> {
    actor: LedgerActor<BS>,
    /// Every event committed through this executor, oldest first
    log: Vec<LedgerEvent>,
}

/// Runs calls from any number of threads against one ledger, one call at a time
///
/// Committed events are appended to an ordered log which can be read from a cursor.
pub struct SerialExecutor<BS: Blockstore> {
    inner: Mutex<Inner<BS>>,
}

impl<BS: Blockstore> SerialExecutor<BS> {
    /// Deploys a new ledger behind an executor. The initial credit is the first logged event
    pub fn construct(
        bs: BS,
        deployer: &Address,
        params: ConstructorParams,
    ) -> Result<Self, HostError> {
        let (actor, receipt) = LedgerActor::construct(bs, deployer, params)?;
        Ok(Self { inner: Mutex::new(Inner { actor, log: receipt.events }) })
    }

    /// Wraps an existing actor with an empty event log
    pub fn new(actor: LedgerActor<BS>) -> Self {
        Self { inner: Mutex::new(Inner { actor, log: Vec::new() }) }
    }

    /// Executes a call once every earlier call has completed
    pub fn execute(
        &self,
        caller: &Address,
        method_num: MethodNum,
        params: Option<IpldBlock>,
    ) -> Receipt {
        let mut inner = self.lock();
        let receipt = inner.actor.invoke(caller, method_num, params);
        inner.log.extend(receipt.events.iter().cloned());
        receipt
    }

    /// Returns the logged events from position `cursor` onwards
    ///
    /// A cursor past the end of the log yields no events.
    pub fn events_since(&self, cursor: usize) -> Vec<LedgerEvent> {
        let inner = self.lock();
        inner.log.get(cursor..).map(<[LedgerEvent]>::to_vec).unwrap_or_default()
    }

    /// Number of events logged so far; the cursor of the next event
    pub fn event_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Root of the last committed state
    pub fn root(&self) -> Cid {
        self.lock().actor.root()
    }

    pub fn into_inner(self) -> LedgerActor<BS> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner).actor
    }

    // calls write state back only after succeeding, so a poisoned guard holds a consistent ledger
    fn lock(&self) -> MutexGuard<'_, Inner<BS>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
