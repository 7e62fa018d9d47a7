#![allow(dead_code)]

use fungible_ledger::ledger::types::{
    ApproveParams, ConstructorParams, GetAllowanceParams, TransferFromParams, TransferParams,
};
use fvm_ipld_blockstore::{Blockstore, MemoryBlockstore};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use ledger_host::{method, LedgerActor, Receipt};
use serde::Serialize;

pub const DEPLOYER: Address = Address::new_id(100);
pub const RECEIVER: Address = Address::new_id(101);
pub const EXCHANGE: Address = Address::new_id(102);

/// Deploys the "Barcelona Beach" ledger with a supply of one million tokens
pub fn deploy() -> (LedgerActor<MemoryBlockstore>, Receipt) {
    let params = ConstructorParams {
        name: "Barcelona Beach".into(),
        symbol: "BCB".into(),
        initial_supply: "1000000".into(),
    };
    LedgerActor::construct(MemoryBlockstore::default(), &DEPLOYER, params).unwrap()
}

pub fn tokens(n: u64) -> TokenAmount {
    TokenAmount::from_whole(n)
}

pub fn cbor<T: Serialize>(params: &T) -> Option<IpldBlock> {
    IpldBlock::serialize_cbor(params).unwrap()
}

/// Helper routines to simplify common operations with a deployed ledger
pub trait TestHelpers {
    /// Call a method on the ledger
    fn call_method(
        &mut self,
        from: &Address,
        method_num: u64,
        params: Option<IpldBlock>,
    ) -> Receipt;

    /// Call a method on the ledger and assert a successful result
    fn call_method_ok(
        &mut self,
        from: &Address,
        method_num: u64,
        params: Option<IpldBlock>,
    ) -> Receipt;

    fn get_balance(&mut self, owner: &Address) -> TokenAmount;

    fn get_allowance(&mut self, owner: &Address, spender: &Address) -> TokenAmount;

    fn transfer(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> Receipt;

    fn approve(&mut self, owner: &Address, spender: &Address, amount: TokenAmount) -> Receipt;

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Receipt;
}

impl<BS: Blockstore> TestHelpers for LedgerActor<BS> {
    fn call_method(
        &mut self,
        from: &Address,
        method_num: u64,
        params: Option<IpldBlock>,
    ) -> Receipt {
        self.invoke(from, method_num, params)
    }

    fn call_method_ok(
        &mut self,
        from: &Address,
        method_num: u64,
        params: Option<IpldBlock>,
    ) -> Receipt {
        let ret = self.call_method(from, method_num, params);
        assert!(ret.is_success(), "call failed: {ret:#?}");
        ret
    }

    fn get_balance(&mut self, owner: &Address) -> TokenAmount {
        let ret = self.call_method_ok(owner, method::BALANCE_OF, cbor(owner));
        ret.deserialize_return().unwrap().unwrap()
    }

    fn get_allowance(&mut self, owner: &Address, spender: &Address) -> TokenAmount {
        let params = GetAllowanceParams { owner: *owner, spender: *spender };
        let ret = self.call_method_ok(owner, method::ALLOWANCE, cbor(&params));
        ret.deserialize_return().unwrap().unwrap()
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> Receipt {
        let params = TransferParams { to: *to, amount };
        self.call_method(from, method::TRANSFER, cbor(&params))
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: TokenAmount) -> Receipt {
        let params = ApproveParams { spender: *spender, amount };
        self.call_method(owner, method::APPROVE, cbor(&params))
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Receipt {
        let params = TransferFromParams { from: *from, to: *to, amount };
        self.call_method(spender, method::TRANSFER_FROM, cbor(&params))
    }
}
