use cid::Cid;
pub use error::LedgerError;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;

use self::state::{LedgerState, StateInvariantError, StateSummary};
use self::types::{ConstructorParams, TransferFromReturn, TransferReturn};
use crate::event::{ApprovalEvent, LedgerEvent, TransferEvent};
use crate::units::{format_units, parse_units};

pub use self::state::StateError as LedgerStateError;

mod error;
pub mod state;
pub mod types;

/// Number of decimal places between a whole token and a base unit. Fixed for every ledger.
pub const DECIMALS: u8 = 18;

/// The null account. It never holds funds and can never be approved as a spender.
pub const ZERO_ADDRESS: Address = Address::new_id(0);

type Result<T> = std::result::Result<T, LedgerError>;

/// Library functions that implement the ledger's state transitions
///
/// Holds the blockstore backing the state tree, a mutable reference to the state and the list of
/// events emitted by commands applied through this handle.
pub struct Ledger<'st, BS>
where
    BS: Blockstore,
{
    /// Blockstore the state tree lives in
    bs: BS,
    /// Reference to ledger state that will be inspected/mutated
    state: &'st mut LedgerState,
    /// Events emitted by successful commands, in order
    events: Vec<LedgerEvent>,
}

impl<'st, BS> Ledger<'st, BS>
where
    BS: Blockstore,
{
    /// Creates the state of a freshly deployed ledger, crediting the whole supply to `deployer`
    ///
    /// The supply figure is given in whole tokens and scaled by 10^18. Returns the state along with
    /// the Transfer event from the null account that records the initial credit. The state must be
    /// flushed to the blockstore explicitly to persist it.
    pub fn create_state(
        bs: &BS,
        deployer: &Address,
        params: &ConstructorParams,
    ) -> Result<(LedgerState, TransferEvent)> {
        Self::create_state_with_bit_width(bs, deployer, params, state::DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Creates the state of a freshly deployed ledger, specifying the underlying Hamt bit widths
    pub fn create_state_with_bit_width(
        bs: &BS,
        deployer: &Address,
        params: &ConstructorParams,
        hamt_bit_width: u32,
    ) -> Result<(LedgerState, TransferEvent)> {
        if *deployer == ZERO_ADDRESS {
            return Err(LedgerError::InvalidRecipient);
        }
        let supply = parse_units(&params.initial_supply, DECIMALS)?;

        let mut state = LedgerState::new_with_bit_width(
            bs,
            params.name.clone(),
            params.symbol.clone(),
            DECIMALS,
            hamt_bit_width,
        )?;
        state.change_balance_by(bs, deployer, &supply)?;
        state.change_supply_by(&supply)?;

        tracing::info!(
            name = %params.name,
            symbol = %params.symbol,
            deployer = %deployer,
            supply = %format_units(&supply, DECIMALS),
            "ledger constructed"
        );

        Ok((state, TransferEvent { from: ZERO_ADDRESS, to: *deployer, value: supply }))
    }

    /// Wrap an existing ledger state
    pub fn wrap(bs: BS, state: &'st mut LedgerState) -> Self {
        Self { bs, state, events: Vec::new() }
    }

    /// For an already initialised state tree, loads the state tree from the blockstore at a Cid
    pub fn load_state(bs: &BS, state_cid: &Cid) -> Result<LedgerState> {
        Ok(LedgerState::load(bs, state_cid)?)
    }

    /// Flush state and return Cid for root
    pub fn flush(&mut self) -> Result<Cid> {
        Ok(self.state.save(&self.bs)?)
    }

    /// Get a reference to the wrapped state tree
    pub fn state(&self) -> &LedgerState {
        self.state
    }

    /// Get a reference to the underlying blockstore
    pub fn blockstore(&self) -> &BS {
        &self.bs
    }

    /// Events emitted through this handle so far, oldest first
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Drains the events emitted through this handle so far, oldest first
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Opens an atomic transaction on LedgerState which allows a closure to make multiple
    /// modifications to the state tree.
    ///
    /// If the closure returns an error, the transaction is dropped atomically and no change is
    /// observed on ledger state.
    fn transaction<F, Res>(&mut self, f: F) -> Result<Res>
    where
        F: FnOnce(&mut LedgerState, &BS) -> Result<Res>,
    {
        let mut mutable_state = self.state.clone();
        let res = f(&mut mutable_state, &self.bs)?;
        // if closure didn't error, save state
        *self.state = mutable_state;
        Ok(res)
    }

    fn emit(&mut self, event: impl Into<LedgerEvent>) {
        self.events.push(event.into());
    }
}

impl<'st, BS> Ledger<'st, BS>
where
    BS: Blockstore,
{
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn symbol(&self) -> &str {
        &self.state.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.state.decimals
    }

    /// Gets the total number of base units in existence
    ///
    /// This equals the sum of `balance_of` called on all accounts and never changes after
    /// construction
    pub fn total_supply(&self) -> TokenAmount {
        self.state.supply.clone()
    }

    /// Returns the balance associated with a particular account
    ///
    /// Accounts that have never received transfers implicitly have a zero-balance
    pub fn balance_of(&self, owner: &Address) -> Result<TokenAmount> {
        Ok(self.state.get_balance(&self.bs, owner)?)
    }

    /// Gets the allowance between owner and spender
    ///
    /// An allowance is the amount that the spender can move out of the owner's account via
    /// `transfer_from`. Pairs that were never approved have a zero allowance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<TokenAmount> {
        Ok(self.state.get_allowance_between(&self.bs, owner, spender)?)
    }

    /// Transfers an amount from the caller to another account
    ///
    /// - The requested value MUST be non-negative
    /// - The recipient MUST NOT be the null account
    /// - The requested value MUST NOT exceed the caller's balance
    ///
    /// Upon successful transfer:
    /// - The caller's balance decreases by the requested value
    /// - The recipient's balance increases by the requested value
    /// - A Transfer event is emitted
    ///
    /// A transfer to the caller's own account only checks the balance and leaves it unchanged.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: &TokenAmount,
    ) -> Result<TransferReturn> {
        let amount = validate_amount(amount, "transfer amount")?;
        if *to == ZERO_ADDRESS {
            return Err(LedgerError::InvalidRecipient);
        }

        let ret = self.transaction(|state, bs| {
            let from_balance = state.get_balance(bs, caller)?;
            if from_balance.lt(amount) {
                return Err(LedgerError::InsufficientBalance {
                    owner: *caller,
                    balance: from_balance,
                    amount: amount.clone(),
                });
            }

            // don't change balance if to == from, the balance check above is all that applies
            if caller == to {
                return Ok(TransferReturn {
                    from_balance: from_balance.clone(),
                    to_balance: from_balance,
                });
            }

            let debit = -amount.clone();
            let from_balance = state.change_balance_by(bs, caller, &debit)?;
            let to_balance = state.change_balance_by(bs, to, amount)?;
            Ok(TransferReturn { from_balance, to_balance })
        })?;

        tracing::debug!(
            from = %caller,
            to = %to,
            amount = %format_units(amount, self.state.decimals),
            "transfer committed"
        );
        self.emit(TransferEvent { from: *caller, to: *to, value: amount.clone() });

        Ok(ret)
    }

    /// Sets the allowance a spender has on the caller's balance, returning the new allowance
    ///
    /// The amount replaces any previous allowance between the pair. No check is made against the
    /// caller's balance; that happens when the allowance is spent. Approving zero revokes.
    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        amount: &TokenAmount,
    ) -> Result<TokenAmount> {
        let amount = validate_amount(amount, "approve amount")?;
        if *spender == ZERO_ADDRESS {
            return Err(LedgerError::InvalidSpender);
        }

        self.transaction(|state, bs| Ok(state.set_allowance(bs, caller, spender, amount)?))?;

        tracing::debug!(
            owner = %caller,
            spender = %spender,
            amount = %format_units(amount, self.state.decimals),
            "approval committed"
        );
        self.emit(ApprovalEvent { owner: *caller, spender: *spender, value: amount.clone() });

        Ok(amount.clone())
    }

    /// Increase the allowance that a spender controls of the caller's balance by the requested
    /// delta, returning the new allowance
    pub fn increase_allowance(
        &mut self,
        caller: &Address,
        spender: &Address,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        let delta = validate_amount(delta, "increase allowance delta")?;
        if *spender == ZERO_ADDRESS {
            return Err(LedgerError::InvalidSpender);
        }

        let new_allowance = self
            .transaction(|state, bs| Ok(state.change_allowance_by(bs, caller, spender, delta)?))?;

        tracing::debug!(owner = %caller, spender = %spender, "allowance increased");
        self.emit(ApprovalEvent {
            owner: *caller,
            spender: *spender,
            value: new_allowance.clone(),
        });

        Ok(new_allowance)
    }

    /// Decrease the allowance that a spender controls of the caller's balance by the requested
    /// delta, returning the new allowance
    ///
    /// If the resulting allowance would be negative, the allowance is set to zero.
    pub fn decrease_allowance(
        &mut self,
        caller: &Address,
        spender: &Address,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        let delta = validate_amount(delta, "decrease allowance delta")?;
        if *spender == ZERO_ADDRESS {
            return Err(LedgerError::InvalidSpender);
        }

        let decrease = -delta.clone();
        let new_allowance = self.transaction(|state, bs| {
            Ok(state.change_allowance_by(bs, caller, spender, &decrease)?)
        })?;

        tracing::debug!(owner = %caller, spender = %spender, "allowance decreased");
        self.emit(ApprovalEvent {
            owner: *caller,
            spender: *spender,
            value: new_allowance.clone(),
        });

        Ok(new_allowance)
    }

    /// Transfers an amount out of `from`'s balance on behalf of its owner
    ///
    /// - The requested value MUST be non-negative
    /// - The recipient MUST NOT be the null account
    /// - The caller MUST have an allowance from `from` not less than the requested value
    /// - The requested value MUST NOT exceed `from`'s balance
    ///
    /// Upon successful transfer:
    /// - `from`'s balance decreases by the requested value
    /// - The recipient's balance increases by the requested value
    /// - The `from`-caller allowance decreases by the requested value
    /// - A single Transfer event is emitted
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: &TokenAmount,
    ) -> Result<TransferFromReturn> {
        let amount = validate_amount(amount, "transfer amount")?;
        if *to == ZERO_ADDRESS {
            return Err(LedgerError::InvalidRecipient);
        }

        let ret = self.transaction(|state, bs| {
            let allowance = match state.attempt_use_allowance(bs, caller, from, amount)? {
                Ok(remaining) => remaining,
                Err(allowance) => {
                    return Err(LedgerError::InsufficientAllowance {
                        owner: *from,
                        spender: *caller,
                        allowance,
                        amount: amount.clone(),
                    })
                }
            };

            let from_balance = state.get_balance(bs, from)?;
            if from_balance.lt(amount) {
                return Err(LedgerError::InsufficientBalance {
                    owner: *from,
                    balance: from_balance,
                    amount: amount.clone(),
                });
            }

            if from == to {
                return Ok(TransferFromReturn {
                    from_balance: from_balance.clone(),
                    to_balance: from_balance,
                    allowance,
                });
            }

            let debit = -amount.clone();
            let from_balance = state.change_balance_by(bs, from, &debit)?;
            let to_balance = state.change_balance_by(bs, to, amount)?;
            Ok(TransferFromReturn { from_balance, to_balance, allowance })
        })?;

        tracing::debug!(
            spender = %caller,
            from = %from,
            to = %to,
            amount = %format_units(amount, self.state.decimals),
            "delegated transfer committed"
        );
        self.emit(TransferEvent { from: *from, to: *to, value: amount.clone() });

        Ok(ret)
    }
}

impl<'st, BS> Ledger<'st, BS>
where
    BS: Blockstore,
{
    /// Checks the state invariants, returning a state summary or the first violation found
    pub fn check_invariants(&self) -> std::result::Result<StateSummary, StateInvariantError> {
        self.state.check_invariants(&self.bs)
    }
}

/// Validates that an amount for a transfer or allowance is non-negative
///
/// Returns the argument, or an error.
pub fn validate_amount<'a>(a: &'a TokenAmount, name: &'static str) -> Result<&'a TokenAmount> {
    if a.is_negative() {
        return Err(LedgerError::InvalidNegative { name, amount: a.clone() });
    }
    Ok(a)
}
