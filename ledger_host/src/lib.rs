//! An in-process host for the fungible ledger
//!
//! Calls are dispatched by FRC-0042 method number with DAG-CBOR encoded parameters. Each call
//! produces a [`Receipt`]; a new state root is committed only when the call succeeds.

pub mod actor;
pub mod error;
pub mod executor;
pub mod method;
pub mod receipt;

pub use actor::LedgerActor;
pub use error::HostError;
pub use executor::SerialExecutor;
pub use receipt::Receipt;
