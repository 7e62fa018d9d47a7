use fungible_ledger::LedgerError;
use fvm_shared::error::ExitCode;
use fvm_shared::MethodNum;
use thiserror::Error;

/// Errors that can occur while dispatching a call to the ledger
#[derive(Error, Debug)]
pub enum HostError {
    /// Rejection or failure from the underlying ledger library
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Error decoding params or encoding a return value
    #[error("ipld encoding error: {0}")]
    Encoding(#[from] fvm_ipld_encoding::Error),
    #[error("method {0} requires params but none were given")]
    MissingParams(MethodNum),
    #[error("unhandled method {0}")]
    UnhandledMethod(MethodNum),
}

impl From<&HostError> for ExitCode {
    fn from(error: &HostError) -> Self {
        match error {
            HostError::Ledger(e) => e.into(),
            HostError::Encoding(_) => ExitCode::USR_SERIALIZATION,
            HostError::MissingParams(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
            HostError::UnhandledMethod(_) => ExitCode::USR_UNHANDLED_MESSAGE,
        }
    }
}

#[cfg(test)]
mod test {
    use fungible_ledger::LedgerError;
    use fvm_shared::error::ExitCode;

    use super::HostError;

    #[test]
    fn it_passes_ledger_reasons_through() {
        let error = HostError::from(LedgerError::InvalidRecipient);
        assert_eq!(error.to_string(), "Invalid recipient");
        assert_eq!(ExitCode::from(&error), ExitCode::USR_ILLEGAL_ARGUMENT);
    }

    #[test]
    fn it_creates_exit_codes() {
        assert_eq!(
            ExitCode::from(&HostError::UnhandledMethod(42)),
            ExitCode::USR_UNHANDLED_MESSAGE
        );
        assert_eq!(ExitCode::from(&HostError::MissingParams(42)), ExitCode::USR_ILLEGAL_ARGUMENT);
    }
}
