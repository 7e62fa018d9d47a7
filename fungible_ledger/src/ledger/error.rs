use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use thiserror::Error;

use crate::ledger::state::StateError as LedgerStateError;
use crate::ledger::state::StateInvariantError;
use crate::units::UnitsError;

/// Errors returned by ledger operations
///
/// The rejection variants display as the literal reason reported to callers.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid recipient")]
    InvalidRecipient,
    #[error("Invalid spender")]
    InvalidSpender,
    #[error("Not enough tokens")]
    InsufficientBalance { owner: Address, balance: TokenAmount, amount: TokenAmount },
    #[error("Insufficient allowance")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: TokenAmount,
        amount: TokenAmount,
    },
    #[error("value {amount:?} for {name:?} must be non-negative")]
    InvalidNegative { name: &'static str, amount: TokenAmount },
    #[error("invalid total supply figure: {0}")]
    InvalidSupply(#[from] UnitsError),
    #[error("error in underlying state {0}")]
    LedgerState(#[from] LedgerStateError),
    #[error("error in state invariants {0}")]
    StateInvariant(#[from] StateInvariantError),
}

impl LedgerError {
    /// Whether this is an expected rejection of caller input, as opposed to a storage failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidRecipient
                | LedgerError::InvalidSpender
                | LedgerError::InsufficientBalance { .. }
                | LedgerError::InsufficientAllowance { .. }
                | LedgerError::InvalidNegative { .. }
                | LedgerError::InvalidSupply(_)
        )
    }
}

impl From<&LedgerError> for ExitCode {
    fn from(error: &LedgerError) -> Self {
        match error {
            LedgerError::InvalidRecipient
            | LedgerError::InvalidSpender
            | LedgerError::InvalidNegative { name: _, amount: _ }
            | LedgerError::InvalidSupply(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
            LedgerError::InsufficientBalance { owner: _, balance: _, amount: _ }
            | LedgerError::InsufficientAllowance {
                owner: _,
                spender: _,
                allowance: _,
                amount: _,
            } => ExitCode::USR_INSUFFICIENT_FUNDS,
            LedgerError::StateInvariant(_) => ExitCode::USR_ILLEGAL_STATE,
            LedgerError::LedgerState(state_error) => match state_error {
                LedgerStateError::IpldHamt(_) | LedgerStateError::Serialization(_) => {
                    ExitCode::USR_SERIALIZATION
                }
                LedgerStateError::NegativeBalance { owner: _, balance: _, delta: _ }
                | LedgerStateError::NegativeAllowance { owner: _, spender: _, amount: _ }
                | LedgerStateError::NegativeTotalSupply { supply: _, delta: _ }
                | LedgerStateError::InvalidAccountKey(_)
                | LedgerStateError::MissingState(_) => ExitCode::USR_ILLEGAL_STATE,
            },
        }
    }
}
