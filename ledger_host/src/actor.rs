use cid::Cid;
use fungible_ledger::ledger::state::{LedgerState, DEFAULT_HAMT_BIT_WIDTH};
use fungible_ledger::ledger::types::{
    AllowanceReturn, ApproveParams, BalanceReturn, ConstructorParams, DecimalsReturn,
    DecreaseAllowanceParams, FungibleLedger, GetAllowanceParams, IncreaseAllowanceParams,
    TotalSupplyReturn, TransferFromParams, TransferFromReturn, TransferParams, TransferReturn,
};
use fungible_ledger::{Ledger, LedgerError, LedgerEvent};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use fvm_shared::MethodNum;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::method::{self, method_name};
use crate::{HostError, Receipt};

/// A deployed ledger: a blockstore and the root of the committed state
///
/// Each command runs against a copy of the committed state. The copy is saved and its root
/// committed only if the command succeeds.
pub struct LedgerActor<BS: Blockstore> {
    bs: BS,
    state: LedgerState,
    root: Cid,
    /// Events from committed commands not yet handed out in a receipt
    events: Vec<LedgerEvent>,
}

impl<BS: Blockstore> LedgerActor<BS> {
    /// Deploys a new ledger, crediting the whole supply to the deployer
    ///
    /// The returned receipt carries the Transfer event of the initial credit.
    pub fn construct(
        bs: BS,
        deployer: &Address,
        params: ConstructorParams,
    ) -> Result<(Self, Receipt), HostError> {
        Self::construct_with_bit_width(bs, deployer, params, DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Deploys a new ledger, specifying the bit width of the underlying Hamts
    pub fn construct_with_bit_width(
        bs: BS,
        deployer: &Address,
        params: ConstructorParams,
        hamt_bit_width: u32,
    ) -> Result<(Self, Receipt), HostError> {
        let (state, mint) =
            Ledger::create_state_with_bit_width(&bs, deployer, &params, hamt_bit_width)?;
        let root = state.save(&bs).map_err(LedgerError::from)?;

        let actor = Self { bs, state, root, events: Vec::new() };
        Ok((actor, Receipt::success(None, vec![mint.into()])))
    }

    /// Resumes a ledger from a previously committed state root
    pub fn load(bs: BS, root: Cid) -> Result<Self, HostError> {
        let state = Ledger::<BS>::load_state(&bs, &root)?;
        Ok(Self { bs, state, root, events: Vec::new() })
    }

    /// Root of the last committed state
    pub fn root(&self) -> Cid {
        self.root
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn blockstore(&self) -> &BS {
        &self.bs
    }

    /// Drains the events of commands committed through the typed interface
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Executes a call by method number with CBOR encoded params
    ///
    /// On success the receipt holds the encoded return value and the events emitted. On failure
    /// nothing is committed and the receipt holds the exit code and reason.
    pub fn invoke(
        &mut self,
        caller: &Address,
        method_num: MethodNum,
        params: Option<IpldBlock>,
    ) -> Receipt {
        // events still pending from the typed interface are not part of this call
        let pending = self.events.len();
        match self.dispatch(caller, method_num, params) {
            Ok(ret) => Receipt::success(ret, self.events.split_off(pending)),
            Err(err) => {
                tracing::debug!(
                    caller = %caller,
                    method = method_name(method_num).unwrap_or("unknown"),
                    exit_code = ExitCode::from(&err).value(),
                    reason = %err,
                    "call rejected"
                );
                Receipt::failure(&err)
            }
        }
    }

    fn dispatch(
        &mut self,
        caller: &Address,
        method_num: MethodNum,
        params: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, HostError> {
        match method_num {
            method::NAME => return_block(&self.name()),
            method::SYMBOL => return_block(&self.symbol()),
            method::DECIMALS => return_block(&self.decimals()),
            method::TOTAL_SUPPLY => {
                let res = self.total_supply()?;
                return_block(&res)
            }
            method::BALANCE_OF => {
                let params = unpack_params(method_num, params)?;
                let res = self.balance_of(params)?;
                return_block(&res)
            }
            method::ALLOWANCE => {
                let params = unpack_params(method_num, params)?;
                let res = self.allowance(params)?;
                return_block(&res)
            }
            method::TRANSFER => {
                let params = unpack_params(method_num, params)?;
                let res = self.transfer(caller, params)?;
                return_block(&res)
            }
            method::APPROVE => {
                let params = unpack_params(method_num, params)?;
                let res = self.approve(caller, params)?;
                return_block(&res)
            }
            method::TRANSFER_FROM => {
                let params = unpack_params(method_num, params)?;
                let res = self.transfer_from(caller, params)?;
                return_block(&res)
            }
            method::INCREASE_ALLOWANCE => {
                let params = unpack_params(method_num, params)?;
                let res = self.increase_allowance(caller, params)?;
                return_block(&res)
            }
            method::DECREASE_ALLOWANCE => {
                let params = unpack_params(method_num, params)?;
                let res = self.decrease_allowance(caller, params)?;
                return_block(&res)
            }
            _ => Err(HostError::UnhandledMethod(method_num)),
        }
    }

    /// Runs a read-only closure against the committed state
    fn query<F, R>(&self, f: F) -> Result<R, HostError>
    where
        F: FnOnce(&Ledger<&BS>) -> Result<R, LedgerError>,
    {
        let mut state = self.state.clone();
        let ledger = Ledger::wrap(&self.bs, &mut state);
        Ok(f(&ledger)?)
    }

    /// Runs a command against a copy of the committed state, committing the copy if it succeeds
    fn command<F, R>(&mut self, f: F) -> Result<R, HostError>
    where
        F: FnOnce(&mut Ledger<&BS>) -> Result<R, LedgerError>,
    {
        let mut state = self.state.clone();
        let mut ledger = Ledger::wrap(&self.bs, &mut state);
        let res = f(&mut ledger)?;
        let root = ledger.flush()?;
        let events = ledger.take_events();

        self.state = state;
        self.root = root;
        self.events.extend(events);
        Ok(res)
    }
}

impl<BS: Blockstore> FungibleLedger for LedgerActor<BS> {
    type LedgerError = HostError;

    fn name(&self) -> String {
        self.state.name.clone()
    }

    fn symbol(&self) -> String {
        self.state.symbol.clone()
    }

    fn decimals(&self) -> DecimalsReturn {
        self.state.decimals
    }

    fn total_supply(&mut self) -> Result<TotalSupplyReturn, HostError> {
        self.query(|ledger| Ok(ledger.total_supply()))
    }

    fn balance_of(&mut self, params: Address) -> Result<BalanceReturn, HostError> {
        self.query(|ledger| ledger.balance_of(&params))
    }

    fn allowance(&mut self, params: GetAllowanceParams) -> Result<AllowanceReturn, HostError> {
        self.query(|ledger| ledger.allowance(&params.owner, &params.spender))
    }

    fn transfer(
        &mut self,
        caller: &Address,
        params: TransferParams,
    ) -> Result<TransferReturn, HostError> {
        self.command(|ledger| ledger.transfer(caller, &params.to, &params.amount))
    }

    fn approve(
        &mut self,
        caller: &Address,
        params: ApproveParams,
    ) -> Result<AllowanceReturn, HostError> {
        self.command(|ledger| ledger.approve(caller, &params.spender, &params.amount))
    }

    fn transfer_from(
        &mut self,
        caller: &Address,
        params: TransferFromParams,
    ) -> Result<TransferFromReturn, HostError> {
        self.command(|ledger| {
            ledger.transfer_from(caller, &params.from, &params.to, &params.amount)
        })
    }

    fn increase_allowance(
        &mut self,
        caller: &Address,
        params: IncreaseAllowanceParams,
    ) -> Result<AllowanceReturn, HostError> {
        self.command(|ledger| ledger.increase_allowance(caller, &params.spender, &params.increase))
    }

    fn decrease_allowance(
        &mut self,
        caller: &Address,
        params: DecreaseAllowanceParams,
    ) -> Result<AllowanceReturn, HostError> {
        self.command(|ledger| ledger.decrease_allowance(caller, &params.spender, &params.decrease))
    }
}

fn unpack_params<T: DeserializeOwned>(
    method_num: MethodNum,
    params: Option<IpldBlock>,
) -> Result<T, HostError> {
    let params = params.ok_or(HostError::MissingParams(method_num))?;
    Ok(params.deserialize()?)
}

fn return_block<T: Serialize + ?Sized>(value: &T) -> Result<Option<IpldBlock>, HostError> {
    Ok(IpldBlock::serialize_cbor(value)?)
}

#[cfg(test)]
mod test {
    use fungible_ledger::ledger::types::{
        ApproveParams, ConstructorParams, FungibleLedger, TransferParams,
    };
    use fungible_ledger::{ApprovalEvent, LedgerEvent, TransferEvent, ZERO_ADDRESS};
    use fvm_ipld_blockstore::MemoryBlockstore;
    use fvm_ipld_encoding::ipld_block::IpldBlock;
    use fvm_shared::address::Address;
    use fvm_shared::econ::TokenAmount;
    use fvm_shared::error::ExitCode;

    use super::LedgerActor;
    use crate::method;

    const DEPLOYER: &Address = &Address::new_id(100);
    const RECEIVER: &Address = &Address::new_id(101);

    fn deploy() -> LedgerActor<MemoryBlockstore> {
        let params = ConstructorParams {
            name: "Barcelona Beach".into(),
            symbol: "BCB".into(),
            initial_supply: "1000000".into(),
        };
        let (actor, _) =
            LedgerActor::construct(MemoryBlockstore::new(), DEPLOYER, params).unwrap();
        actor
    }

    #[test]
    fn it_reports_the_mint_on_construction() {
        let params = ConstructorParams {
            name: "Barcelona Beach".into(),
            symbol: "BCB".into(),
            initial_supply: "1000000".into(),
        };
        let (actor, receipt) =
            LedgerActor::construct(MemoryBlockstore::new(), DEPLOYER, params).unwrap();
        assert!(receipt.is_success());
        assert_eq!(
            receipt.events,
            vec![LedgerEvent::Transfer(TransferEvent {
                from: ZERO_ADDRESS,
                to: *DEPLOYER,
                value: TokenAmount::from_whole(1_000_000)
            })]
        );

        // the committed root can be reloaded
        let reloaded = LedgerActor::load(actor.blockstore(), actor.root()).unwrap();
        assert_eq!(reloaded.state(), actor.state());
    }

    #[test]
    fn it_commits_a_new_root_only_on_success() {
        let mut actor = deploy();
        let root = actor.root();

        let params = TransferParams { to: *RECEIVER, amount: TokenAmount::from_whole(10_000_000) };
        actor.transfer(DEPLOYER, params).unwrap_err();
        assert_eq!(actor.root(), root);
        assert!(actor.take_events().is_empty());

        let params = TransferParams { to: *RECEIVER, amount: TokenAmount::from_whole(1) };
        actor.transfer(DEPLOYER, params).unwrap();
        assert_ne!(actor.root(), root);
        assert_eq!(actor.take_events().len(), 1);
    }

    #[test]
    fn it_keeps_receipts_to_the_events_of_their_own_call() {
        let mut actor = deploy();

        // committed through the typed interface, not yet drained
        let params = TransferParams { to: *RECEIVER, amount: TokenAmount::from_whole(1) };
        actor.transfer(DEPLOYER, params).unwrap();

        let receipt = actor.invoke(DEPLOYER, method::NAME, None);
        assert!(receipt.is_success());
        assert!(receipt.events.is_empty());

        let params = ApproveParams { spender: *RECEIVER, amount: TokenAmount::from_whole(3) };
        let params = IpldBlock::serialize_cbor(&params).unwrap();
        let receipt = actor.invoke(DEPLOYER, method::APPROVE, params);
        assert_eq!(
            receipt.events,
            vec![LedgerEvent::Approval(ApprovalEvent {
                owner: *DEPLOYER,
                spender: *RECEIVER,
                value: TokenAmount::from_whole(3)
            })]
        );

        // the typed transfer is still there for whoever drains the typed interface
        let pending = actor.take_events();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].as_transfer().unwrap().to, *RECEIVER);
    }

    #[test]
    fn it_rejects_unknown_methods() {
        let mut actor = deploy();
        let receipt = actor.invoke(DEPLOYER, 0xdead_beef, None);
        assert_eq!(receipt.exit_code, ExitCode::USR_UNHANDLED_MESSAGE);
        assert!(receipt.events.is_empty());
    }

    #[test]
    fn it_rejects_bad_params() {
        let mut actor = deploy();
        let root = actor.root();

        let receipt = actor.invoke(DEPLOYER, method::TRANSFER, None);
        assert_eq!(receipt.exit_code, ExitCode::USR_ILLEGAL_ARGUMENT);

        // a bare string where TransferParams are expected
        let params = IpldBlock::serialize_cbor("not transfer params").unwrap();
        let receipt = actor.invoke(DEPLOYER, method::TRANSFER, params);
        assert_eq!(receipt.exit_code, ExitCode::USR_SERIALIZATION);
        assert!(receipt.reason.is_some());
        assert_eq!(actor.root(), root);
    }
}
