pub mod event;
pub mod ledger;
pub mod units;

pub use event::{ApprovalEvent, LedgerEvent, TransferEvent};
pub use ledger::{Ledger, LedgerError, DECIMALS, ZERO_ADDRESS};
