use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use serde::{Deserialize, Serialize};

/// Emitted whenever value moves between two accounts, including the initial credit at
/// construction (where `from` is the null account)
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
}

/// Emitted whenever an owner sets or adjusts what a spender may move out of its balance
///
/// `value` is always the resulting allowance, never the delta that produced it.
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct ApprovalEvent {
    pub owner: Address,
    pub spender: Address,
    pub value: TokenAmount,
}

/// An entry in the append-only event stream observed by indexers
///
/// Each successful command produces exactly one event, appended only once the state change that
/// it describes has been written back.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub enum LedgerEvent {
    Transfer(TransferEvent),
    Approval(ApprovalEvent),
}

impl LedgerEvent {
    /// Short name used by indexers and logs
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Transfer(_) => "Transfer",
            LedgerEvent::Approval(_) => "Approval",
        }
    }

    pub fn as_transfer(&self) -> Option<&TransferEvent> {
        match self {
            LedgerEvent::Transfer(e) => Some(e),
            LedgerEvent::Approval(_) => None,
        }
    }

    pub fn as_approval(&self) -> Option<&ApprovalEvent> {
        match self {
            LedgerEvent::Approval(e) => Some(e),
            LedgerEvent::Transfer(_) => None,
        }
    }
}

impl From<TransferEvent> for LedgerEvent {
    fn from(event: TransferEvent) -> Self {
        LedgerEvent::Transfer(event)
    }
}

impl From<ApprovalEvent> for LedgerEvent {
    fn from(event: ApprovalEvent) -> Self {
        LedgerEvent::Approval(event)
    }
}

#[cfg(test)]
mod test {
    use fvm_ipld_encoding::RawBytes;
    use fvm_shared::address::Address;
    use fvm_shared::econ::TokenAmount;

    use super::{ApprovalEvent, LedgerEvent, TransferEvent};

    #[test]
    fn it_names_events() {
        let transfer = LedgerEvent::from(TransferEvent {
            from: Address::new_id(1),
            to: Address::new_id(2),
            value: TokenAmount::from_whole(1),
        });
        assert_eq!(transfer.name(), "Transfer");
        assert!(transfer.as_transfer().is_some());
        assert!(transfer.as_approval().is_none());

        let approval = LedgerEvent::from(ApprovalEvent {
            owner: Address::new_id(1),
            spender: Address::new_id(3),
            value: TokenAmount::from_whole(5),
        });
        assert_eq!(approval.name(), "Approval");
        assert_eq!(approval.as_approval().unwrap().spender, Address::new_id(3));
    }

    #[test]
    fn it_encodes_events_for_indexers() {
        let event = LedgerEvent::Approval(ApprovalEvent {
            owner: Address::new_id(10),
            spender: Address::new_id(11),
            value: TokenAmount::from_atto(42),
        });
        let bytes = RawBytes::serialize(&event).unwrap();
        let decoded: LedgerEvent = bytes.deserialize().unwrap();
        assert_eq!(decoded, event);
    }
}
