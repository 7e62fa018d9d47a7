use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;

/// A fixed-supply fungible token interface in the style of ERC-20. This represents the external
/// interface a host exposes to callers of a deployed ledger
///
/// The caller of every command is passed explicitly, it is never read from ambient context.
/// Hosts link these methods to dispatch numbers (as defined by
/// [FRC-0042](https://github.com/filecoin-project/FIPs/blob/master/FRCs/frc-0042.md)).
pub trait FungibleLedger {
    type LedgerError;

    /// Returns the display name of the token
    fn name(&self) -> String;

    /// Returns the ticker symbol of the token
    fn symbol(&self) -> String;

    /// Returns the number of decimals between a whole token and a base unit
    ///
    /// Fixed at 18; returned as a plain integer, not a scaling factor.
    fn decimals(&self) -> DecimalsReturn;

    /// Returns the total amount of the token in existence, in base units
    ///
    /// The total supply equals the sum of the balances of all accounts and never changes after
    /// construction.
    fn total_supply(&mut self) -> Result<TotalSupplyReturn, Self::LedgerError>;

    /// Returns the balance of an account
    ///
    /// Accounts that never received funds have an implicit zero balance.
    fn balance_of(&mut self, params: Address) -> Result<BalanceReturn, Self::LedgerError>;

    /// Returns the amount a spender may still move out of an owner's balance
    fn allowance(
        &mut self,
        params: GetAllowanceParams,
    ) -> Result<AllowanceReturn, Self::LedgerError>;

    /// Transfers tokens from the caller to another account
    ///
    /// The recipient must not be the null account and the caller's balance must cover the amount.
    /// Transferring to the caller's own account is a normal transfer that leaves its balance
    /// unchanged.
    fn transfer(
        &mut self,
        caller: &Address,
        params: TransferParams,
    ) -> Result<TransferReturn, Self::LedgerError>;

    /// Sets the amount a spender may move out of the caller's balance, overwriting any previous
    /// approval
    ///
    /// The spender must not be the null account. Approving zero revokes. No balance check is made.
    fn approve(
        &mut self,
        caller: &Address,
        params: ApproveParams,
    ) -> Result<AllowanceReturn, Self::LedgerError>;

    /// Transfers tokens out of another account's balance, spending the caller's allowance
    fn transfer_from(
        &mut self,
        caller: &Address,
        params: TransferFromParams,
    ) -> Result<TransferFromReturn, Self::LedgerError>;

    /// Atomically increases the allowance the caller has granted a spender
    fn increase_allowance(
        &mut self,
        caller: &Address,
        params: IncreaseAllowanceParams,
    ) -> Result<AllowanceReturn, Self::LedgerError>;

    /// Atomically decreases the allowance the caller has granted a spender, stopping at zero
    fn decrease_allowance(
        &mut self,
        caller: &Address,
        params: DecreaseAllowanceParams,
    ) -> Result<AllowanceReturn, Self::LedgerError>;
}

pub type DecimalsReturn = u8;
pub type TotalSupplyReturn = TokenAmount;
pub type BalanceReturn = TokenAmount;
pub type AllowanceReturn = TokenAmount;

/// Parameters given when a ledger is deployed
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct ConstructorParams {
    pub name: String,
    pub symbol: String,
    /// Total supply in whole tokens as a decimal figure, e.g. "1000000"
    pub initial_supply: String,
}

/// Instruction to transfer tokens to another account
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct TransferParams {
    pub to: Address,
    /// A non-negative amount in base units
    pub amount: TokenAmount,
}

/// Return value after a successful transfer
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct TransferReturn {
    /// The new balance of the `from` account
    pub from_balance: TokenAmount,
    /// The new balance of the `to` account
    pub to_balance: TokenAmount,
}

/// Instruction to set the allowance of a spender on the caller's balance
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct ApproveParams {
    pub spender: Address,
    /// A non-negative amount in base units
    pub amount: TokenAmount,
}

/// Instruction to transfer tokens between two accounts as an approved spender
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct TransferFromParams {
    pub from: Address,
    pub to: Address,
    /// A non-negative amount in base units
    pub amount: TokenAmount,
}

/// Return value after a successful delegated transfer
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct TransferFromReturn {
    /// The new balance of the `from` account
    pub from_balance: TokenAmount,
    /// The new balance of the `to` account
    pub to_balance: TokenAmount,
    /// The remaining allowance between `from` and the spender (caller)
    pub allowance: TokenAmount,
}

/// Instruction to increase an allowance between two accounts
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct IncreaseAllowanceParams {
    pub spender: Address,
    /// A non-negative amount to increase the allowance by
    pub increase: TokenAmount,
}

/// Instruction to decrease an allowance between two accounts
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct DecreaseAllowanceParams {
    pub spender: Address,
    /// A non-negative amount to decrease the allowance by
    pub decrease: TokenAmount,
}

/// Params to get the allowance between two accounts
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct GetAllowanceParams {
    pub owner: Address,
    pub spender: Address,
}
