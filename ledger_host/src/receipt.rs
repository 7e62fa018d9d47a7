use fungible_ledger::LedgerEvent;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::error::ExitCode;
use serde::de::DeserializeOwned;

use crate::HostError;

/// The outcome of a single call against a ledger
#[derive(Clone, Debug)]
pub struct Receipt {
    pub exit_code: ExitCode,
    /// CBOR encoded return value, if the method returns one
    pub return_data: Option<IpldBlock>,
    /// Events emitted by the call. Always empty for rejected calls
    pub events: Vec<LedgerEvent>,
    /// Literal reason given for a rejection
    pub reason: Option<String>,
}

impl Receipt {
    pub fn success(return_data: Option<IpldBlock>, events: Vec<LedgerEvent>) -> Self {
        Self { exit_code: ExitCode::OK, return_data, events, reason: None }
    }

    pub fn failure(error: &HostError) -> Self {
        Self {
            exit_code: error.into(),
            return_data: None,
            events: Vec::new(),
            reason: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code.is_success()
    }

    /// Decodes the return value of a successful call
    pub fn deserialize_return<T: DeserializeOwned>(&self) -> Result<Option<T>, HostError> {
        match &self.return_data {
            Some(block) => Ok(Some(block.deserialize()?)),
            None => Ok(None),
        }
    }
}
