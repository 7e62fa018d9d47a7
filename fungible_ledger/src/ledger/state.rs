use anyhow::bail;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::CborStore;
use fvm_ipld_hamt::Hamt;
use fvm_ipld_hamt::{BytesKey, Error as HamtError};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use multihash_codetable::Code;
use num_traits::Zero;
use thiserror::Error;

/// This value has been chosen to keep the balance map shallow for ledgers with a modest number of
/// holders. Ledgers expecting very many holders might find a wider value more efficient.
pub const DEFAULT_HAMT_BIT_WIDTH: u32 = 3;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("ipld hamt error: {0}")]
    IpldHamt(#[from] HamtError),
    #[error("missing state at cid: {0}")]
    MissingState(Cid),
    #[error("underlying serialization error: {0}")]
    Serialization(String),
    #[error("invalid serialized account key {0:?}")]
    InvalidAccountKey(BytesKey),
    #[error(
        "negative balance caused by changing {owner:?}'s balance of {balance:?} by {delta:?}"
    )]
    NegativeBalance { owner: Address, balance: TokenAmount, delta: TokenAmount },
    #[error("total_supply cannot be negative, cannot apply delta of {delta:?} to {supply:?}")]
    NegativeTotalSupply { supply: TokenAmount, delta: TokenAmount },
    #[error(
        "allowance cannot be negative, cannot set allowance between {owner:?} and {spender:?} \
         to {amount:?}"
    )]
    NegativeAllowance { owner: Address, spender: Address, amount: TokenAmount },
}

#[derive(Error, Debug)]
pub enum StateInvariantError {
    #[error("total supply was negative: {0:?}")]
    SupplyNegative(TokenAmount),
    #[error("the account for {account:?} had a negative balance of {balance:?}")]
    BalanceNegative { account: Address, balance: TokenAmount },
    #[error("the total supply {supply:?} does not match the sum of all balances {balance_sum:?}")]
    BalanceSupplyMismatch { supply: TokenAmount, balance_sum: TokenAmount },
    #[error(
        "a negative allowance of {allowance:?} was specified between {owner:?} and {spender:?}"
    )]
    NegativeAllowance { owner: Address, spender: Address, allowance: TokenAmount },
    #[error("stored a zero balance which should have been removed for {0}")]
    ExplicitZeroBalance(Address),
    #[error(
        "stored a zero allowance which should have been removed between {owner:?} and {spender:?}"
    )]
    ExplicitZeroAllowance { owner: Address, spender: Address },
    #[error("stored an allowance map for {0} though they have specified no allowances")]
    ExplicitEmptyAllowance(Address),
    #[error("invalid serialized account key {0:?}")]
    InvalidAccountKey(BytesKey),
    #[error("underlying state error {0}")]
    State(#[from] StateError),
}

type Result<T> = std::result::Result<T, StateError>;

type Map<'bs, BS, K, V> = Hamt<&'bs BS, V, K>;
type BalanceMap<'bs, BS> = Map<'bs, BS, BytesKey, TokenAmount>;
type AllowanceMap<'bs, BS> = Map<'bs, BS, BytesKey, Cid>;
type OwnerAllowanceMap<'bs, BS> = Map<'bs, BS, BytesKey, TokenAmount>;

/// Ledger state IPLD structure
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct LedgerState {
    /// Display name, fixed at construction
    pub name: String,
    /// Ticker symbol, fixed at construction
    pub symbol: String,
    /// Number of decimal places between tokens and base units
    pub decimals: u8,
    /// Total supply in base units
    pub supply: TokenAmount,
    /// Map<Address, TokenAmount> of balances as a Hamt
    pub balances: Cid,
    /// Map<Address, Map<Address, TokenAmount>> as a Hamt. Allowances are stored
    /// allowances[owner][spender]
    pub allowances: Cid,
    /// Bit-width to use when loading Hamts
    hamt_bit_width: u32,
}

/// An abstraction over the IPLD layer to get and modify ledger state without dealing with HAMTs
///
/// This is a simple wrapper of state and does not enforce ledger protocol rules such as rejecting
/// the null account or checking allowances before a delegated transfer. That is left to the
/// caller. Non-negative balances, allowances and total supply are enforced here.
impl LedgerState {
    /// Create an empty state-tree, without committing it (the root cid) to a blockstore
    pub fn new<BS: Blockstore>(
        bs: &BS,
        name: String,
        symbol: String,
        decimals: u8,
    ) -> Result<Self> {
        Self::new_with_bit_width(bs, name, symbol, decimals, DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Create an empty state-tree, without committing it (the root cid) to a blockstore
    ///
    /// Explicitly sets the bit width of underlying Hamt structures. Caller must ensure
    /// 1 <= hamt_bit_width <= 8.
    pub fn new_with_bit_width<BS: Blockstore>(
        bs: &BS,
        name: String,
        symbol: String,
        decimals: u8,
        hamt_bit_width: u32,
    ) -> Result<Self> {
        // Blockstore is still needed to create valid Cids for the Hamts
        let empty_balance_map = BalanceMap::new_with_bit_width(bs, hamt_bit_width).flush()?;
        let empty_allowances_map = AllowanceMap::new_with_bit_width(bs, hamt_bit_width).flush()?;

        Ok(Self {
            name,
            symbol,
            decimals,
            supply: TokenAmount::zero(),
            balances: empty_balance_map,
            allowances: empty_allowances_map,
            hamt_bit_width,
        })
    }

    /// Loads a fresh copy of the state from a blockstore from a given cid
    pub fn load<BS: Blockstore>(bs: &BS, cid: &Cid) -> Result<Self> {
        match bs.get_cbor::<Self>(cid) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(StateError::MissingState(*cid)),
            Err(err) => Err(StateError::Serialization(err.to_string())),
        }
    }

    /// Saves the current state to the blockstore, returning the cid
    pub fn save<BS: Blockstore>(&self, bs: &BS) -> Result<Cid> {
        bs.put_cbor(self, Code::Blake2b256)
            .map_err(|err| StateError::Serialization(err.to_string()))
    }

    pub fn hamt_bit_width(&self) -> u32 {
        self.hamt_bit_width
    }

    /// Get the balance of an account from the currently stored state
    pub fn get_balance<BS: Blockstore>(&self, bs: &BS, owner: &Address) -> Result<TokenAmount> {
        let balances = self.get_balance_map(bs)?;

        let balance = match balances.get(&account_key(owner))? {
            Some(amount) => amount.clone(),
            None => TokenAmount::zero(),
        };

        Ok(balance)
    }

    /// Changes the balance of the specified account by the delta
    ///
    /// Caller must ensure that the sign of the delta is consistent with ledger rules (i.e. a debit
    /// has already been checked against the balance). Returns the new balance of the account.
    pub fn change_balance_by<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: &Address,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        if delta.is_zero() {
            // This is a no-op as far as mutating state
            return self.get_balance(bs, owner);
        }

        let mut balance_map = self.get_balance_map(bs)?;
        let owner_key = account_key(owner);
        let balance = match balance_map.get(&owner_key)? {
            Some(amount) => amount.clone(),
            None => TokenAmount::zero(),
        };

        let new_balance = &balance + delta;

        if new_balance.is_negative() {
            return Err(StateError::NegativeBalance {
                owner: *owner,
                balance,
                delta: delta.clone(),
            });
        }

        if new_balance.is_zero() {
            balance_map.delete(&owner_key)?;
        } else {
            balance_map.set(owner_key, new_balance.clone())?;
        }

        self.balances = balance_map.flush()?;

        Ok(new_balance)
    }

    /// Retrieve the balance map as a HAMT
    pub fn get_balance_map<'bs, BS: Blockstore>(&self, bs: &'bs BS) -> Result<BalanceMap<'bs, BS>> {
        Ok(BalanceMap::load_with_bit_width(&self.balances, bs, self.hamt_bit_width)?)
    }

    /// Retrieve the number of accounts holding a non-zero balance
    ///
    /// This involves iterating through the entire HAMT
    pub fn count_balances<BS: Blockstore>(&self, bs: &BS) -> Result<usize> {
        let balance_map = self.get_balance_map(bs)?;
        let mut count = 0;
        balance_map.for_each(|_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Increase/decrease the total supply by the specified value
    ///
    /// Returns the new total supply
    pub fn change_supply_by(&mut self, delta: &TokenAmount) -> Result<&TokenAmount> {
        let new_supply = &self.supply + delta;
        if new_supply.is_negative() {
            return Err(StateError::NegativeTotalSupply {
                supply: self.supply.clone(),
                delta: delta.clone(),
            });
        }

        self.supply = new_supply;
        Ok(&self.supply)
    }

    /// Get the allowance that an owner has approved for a spender
    ///
    /// If an existing allowance cannot be found, it is implicitly assumed to be zero
    pub fn get_allowance_between<BS: Blockstore>(
        &self,
        bs: &BS,
        owner: &Address,
        spender: &Address,
    ) -> Result<TokenAmount> {
        match self.get_owner_allowance_map(bs, owner)? {
            Some(map) => match map.get(&account_key(spender))? {
                Some(allowance) => Ok(allowance.clone()),
                None => Ok(TokenAmount::zero()),
            },
            None => Ok(TokenAmount::zero()),
        }
    }

    /// Change the allowance between owner and spender by the specified delta
    ///
    /// The resulting allowance is clamped at zero. Returns the new allowance.
    pub fn change_allowance_by<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: &Address,
        spender: &Address,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        if delta.is_zero() {
            // This is a no-op as far as mutating state
            return self.get_allowance_between(bs, owner, spender);
        }

        let current = self.get_allowance_between(bs, owner, spender)?;
        let new_allowance = (&current + delta).max(TokenAmount::zero());
        self.set_allowance(bs, owner, spender, &new_allowance)?;

        Ok(new_allowance)
    }

    /// Revokes an approved allowance by removing the entry from the owner-spender map
    ///
    /// If that map becomes empty, it is removed from the root map. Returns the old allowance
    pub fn revoke_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: &Address,
        spender: &Address,
    ) -> Result<TokenAmount> {
        let Some(mut map) = self.get_owner_allowance_map(bs, owner)? else {
            // no allowance map exists, there is nothing to do
            return Ok(TokenAmount::zero());
        };

        let old_allowance = match map.delete(&account_key(spender))? {
            Some((_, amount)) => amount,
            None => TokenAmount::zero(),
        };

        // if the allowance map has become empty it can be dropped entirely
        let owner_key = account_key(owner);
        let mut root_allowance_map = self.get_allowances_map(bs)?;
        if map.is_empty() {
            root_allowance_map.delete(&owner_key)?;
        } else {
            root_allowance_map.set(owner_key, map.flush()?)?;
        }
        self.allowances = root_allowance_map.flush()?;

        Ok(old_allowance)
    }

    /// Set the allowance between owner and spender to a specific amount, returning the old
    /// allowance
    pub fn set_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: &Address,
        spender: &Address,
        amount: &TokenAmount,
    ) -> Result<TokenAmount> {
        if amount.is_negative() {
            return Err(StateError::NegativeAllowance {
                owner: *owner,
                spender: *spender,
                amount: amount.clone(),
            });
        }

        if amount.is_zero() {
            // zero allowances are never stored
            return self.revoke_allowance(bs, owner, spender);
        }

        let mut root_allowances_map = self.get_allowances_map(bs)?;

        // get or create the owner's allowance map
        let owner_key = account_key(owner);
        let mut allowance_map = match root_allowances_map.get(&owner_key)? {
            Some(cid) => OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)?,
            None => OwnerAllowanceMap::new_with_bit_width(bs, self.hamt_bit_width),
        };

        let old_allowance = allowance_map.set(account_key(spender), amount.clone())?;

        root_allowances_map.set(owner_key, allowance_map.flush()?)?;
        self.allowances = root_allowances_map.flush()?;

        Ok(old_allowance.unwrap_or_else(TokenAmount::zero))
    }

    /// Atomically checks that the amount does not exceed the allowance and deducts it if so
    ///
    /// Returns the new allowance if successful. Returns `Ok(Err(allowance))` carrying the current
    /// allowance if it is too small, in which case state is unchanged.
    pub fn attempt_use_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        spender: &Address,
        owner: &Address,
        amount: &TokenAmount,
    ) -> Result<std::result::Result<TokenAmount, TokenAmount>> {
        let current_allowance = self.get_allowance_between(bs, owner, spender)?;

        if current_allowance.lt(amount) {
            return Ok(Err(current_allowance));
        }

        if amount.is_zero() {
            return Ok(Ok(current_allowance));
        }

        let new_allowance = &current_allowance - amount;
        self.set_allowance(bs, owner, spender, &new_allowance)?;

        Ok(Ok(new_allowance))
    }

    /// Get the allowances map of a specific account, resolving the CID link to a Hamt
    ///
    /// Ok(Some) if the owner has allocated allowances to other accounts
    /// Ok(None) if the owner has no current non-zero allowances to other accounts
    /// Err if operations on the underlying Hamt failed
    pub fn get_owner_allowance_map<'bs, BS: Blockstore>(
        &self,
        bs: &'bs BS,
        owner: &Address,
    ) -> Result<Option<OwnerAllowanceMap<'bs, BS>>> {
        let allowances_map = self.get_allowances_map(bs)?;
        let owner_allowances = match allowances_map.get(&account_key(owner))? {
            Some(cid) => {
                Some(OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)?)
            }
            None => None,
        };
        Ok(owner_allowances)
    }

    /// Get the global allowances map
    ///
    /// Gets a HAMT with CIDs linking to other HAMTs
    pub fn get_allowances_map<'bs, BS: Blockstore>(
        &self,
        bs: &'bs BS,
    ) -> Result<AllowanceMap<'bs, BS>> {
        Ok(AllowanceMap::load_with_bit_width(&self.allowances, bs, self.hamt_bit_width)?)
    }

    /// Checks that the current state obeys all system invariants
    ///
    /// Checks that there are no zero balances, zero allowances or empty allowance maps explicitly
    /// stored in the blockstore. Checks that balances, total supply, allowances are never negative.
    /// Checks that sum of all balances matches total_supply.
    ///
    /// Returns a state summary that can be used to check application specific invariants.
    pub fn check_invariants<BS: Blockstore>(
        &self,
        bs: &BS,
    ) -> std::result::Result<StateSummary, StateInvariantError> {
        if self.supply.is_negative() {
            return Err(StateInvariantError::SupplyNegative(self.supply.clone()));
        }

        // check balances
        let mut balance_sum = TokenAmount::zero();
        let mut holders = 0;
        let mut maybe_err: Option<StateInvariantError> = None;
        let balances = self.get_balance_map(bs)?;
        let res = balances.for_each(|owner_key, balance| {
            let Some(owner) = decode_account(owner_key) else {
                maybe_err = Some(StateInvariantError::InvalidAccountKey(owner_key.clone()));
                bail!("invariant failed")
            };
            if balance.is_negative() {
                maybe_err = Some(StateInvariantError::BalanceNegative {
                    account: owner,
                    balance: balance.clone(),
                });
                bail!("invariant failed")
            }
            // zero balances should not be stored in the Hamt
            if balance.is_zero() {
                maybe_err = Some(StateInvariantError::ExplicitZeroBalance(owner));
                bail!("invariant failed")
            }

            balance_sum += balance.clone();
            holders += 1;
            Ok(())
        });
        fail_on_invariant(res, maybe_err)?;

        // all balances must add up to total supply
        if balance_sum.ne(&self.supply) {
            return Err(StateInvariantError::BalanceSupplyMismatch {
                supply: self.supply.clone(),
                balance_sum,
            });
        }

        // check allowances are all positive and that no empty owner maps linger
        let mut maybe_err: Option<StateInvariantError> = None;
        let mut allowance_owners = 0;
        let allowances_map = self.get_allowances_map(bs)?;
        let res = allowances_map.for_each(|owner_key, cid| {
            let Some(owner) = decode_account(owner_key) else {
                maybe_err = Some(StateInvariantError::InvalidAccountKey(owner_key.clone()));
                bail!("invariant failed")
            };
            let allowance_map =
                OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)?;
            if allowance_map.is_empty() {
                maybe_err = Some(StateInvariantError::ExplicitEmptyAllowance(owner));
                bail!("invariant failed")
            }

            allowance_map.for_each(|spender_key, allowance| {
                let Some(spender) = decode_account(spender_key) else {
                    maybe_err = Some(StateInvariantError::InvalidAccountKey(spender_key.clone()));
                    bail!("invariant failed")
                };
                if allowance.is_negative() {
                    maybe_err = Some(StateInvariantError::NegativeAllowance {
                        owner,
                        spender,
                        allowance: allowance.clone(),
                    });
                    bail!("invariant failed")
                }
                if allowance.is_zero() {
                    maybe_err = Some(StateInvariantError::ExplicitZeroAllowance { owner, spender });
                    bail!("invariant failed")
                }
                Ok(())
            })?;

            allowance_owners += 1;
            Ok(())
        });
        fail_on_invariant(res, maybe_err)?;

        Ok(StateSummary { total_supply: self.supply.clone(), holders, allowance_owners })
    }
}

/// Converts the outcome of a HAMT walk into the invariant error recorded during the walk, if any
fn fail_on_invariant(
    res: std::result::Result<(), HamtError>,
    maybe_err: Option<StateInvariantError>,
) -> std::result::Result<(), StateInvariantError> {
    match (res, maybe_err) {
        (Ok(()), _) => Ok(()),
        (Err(_), Some(err)) => Err(err),
        (Err(err), None) => Err(StateError::from(err).into()),
    }
}

/// HAMT key for an account: the address' canonical byte encoding
pub fn account_key(a: &Address) -> BytesKey {
    a.to_bytes().into()
}

pub fn decode_account(key: &BytesKey) -> Option<Address> {
    Address::from_bytes(&key.0).ok()
}

/// A summary of the current state to allow checking application specific invariants
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateSummary {
    pub total_supply: TokenAmount,
    /// Number of accounts holding a non-zero balance
    pub holders: usize,
    /// Number of accounts with at least one outstanding allowance
    pub allowance_owners: usize,
}
