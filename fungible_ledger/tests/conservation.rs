//! Randomized command sequences against a single ledger, checking that funds are conserved and
//! that rejected commands leave no trace.

use fungible_ledger::ledger::state::LedgerState;
use fungible_ledger::ledger::types::ConstructorParams;
use fungible_ledger::{Ledger, LedgerEvent};
use fvm_ipld_blockstore::MemoryBlockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;
use proptest::prelude::*;

/// Number of distinct accounts commands are drawn from. Id 0 is the null account.
const ACCOUNTS: u64 = 6;

const MAX_COMMANDS: usize = 40;

const INITIAL_SUPPLY: u64 = 1_000;

#[derive(Debug, Clone)]
enum Command {
    Transfer { caller: u64, to: u64, amount: u64 },
    Approve { caller: u64, spender: u64, amount: u64 },
    TransferFrom { caller: u64, from: u64, to: u64, amount: u64 },
    IncreaseAllowance { caller: u64, spender: u64, amount: u64 },
    DecreaseAllowance { caller: u64, spender: u64, amount: u64 },
}

fn account() -> impl Strategy<Value = u64> {
    0..ACCOUNTS
}

// amounts are in whole tokens and may exceed any balance
fn amount() -> impl Strategy<Value = u64> {
    0..(INITIAL_SUPPLY * 2)
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        (account(), account(), amount())
            .prop_map(|(caller, to, amount)| Command::Transfer { caller, to, amount }),
        (account(), account(), amount())
            .prop_map(|(caller, spender, amount)| Command::Approve { caller, spender, amount }),
        (account(), account(), account(), amount()).prop_map(|(caller, from, to, amount)| {
            Command::TransferFrom { caller, from, to, amount }
        }),
        (account(), account(), amount()).prop_map(|(caller, spender, amount)| {
            Command::IncreaseAllowance { caller, spender, amount }
        }),
        (account(), account(), amount()).prop_map(|(caller, spender, amount)| {
            Command::DecreaseAllowance { caller, spender, amount }
        }),
    ]
}

fn addr(id: u64) -> Address {
    Address::new_id(id)
}

fn tokens(n: u64) -> TokenAmount {
    TokenAmount::from_whole(n)
}

fn apply(ledger: &mut Ledger<&MemoryBlockstore>, command: &Command) -> bool {
    let res = match command {
        Command::Transfer { caller, to, amount } => {
            ledger.transfer(&addr(*caller), &addr(*to), &tokens(*amount)).map(|_| ())
        }
        Command::Approve { caller, spender, amount } => {
            ledger.approve(&addr(*caller), &addr(*spender), &tokens(*amount)).map(|_| ())
        }
        Command::TransferFrom { caller, from, to, amount } => ledger
            .transfer_from(&addr(*caller), &addr(*from), &addr(*to), &tokens(*amount))
            .map(|_| ()),
        Command::IncreaseAllowance { caller, spender, amount } => ledger
            .increase_allowance(&addr(*caller), &addr(*spender), &tokens(*amount))
            .map(|_| ()),
        Command::DecreaseAllowance { caller, spender, amount } => ledger
            .decrease_allowance(&addr(*caller), &addr(*spender), &tokens(*amount))
            .map(|_| ()),
    };
    match res {
        Ok(()) => true,
        Err(err) => {
            assert!(err.is_rejection(), "unexpected failure {err:?}");
            false
        }
    }
}

fn deploy(bs: &MemoryBlockstore) -> LedgerState {
    let params = ConstructorParams {
        name: "Prop Token".into(),
        symbol: "PROP".into(),
        initial_supply: INITIAL_SUPPLY.to_string(),
    };
    let (state, _) = Ledger::create_state(bs, &addr(1), &params).unwrap();
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Total supply stays fixed and always equals the sum of all balances
    #[test]
    fn prop_conserves_supply(commands in prop::collection::vec(command(), 1..MAX_COMMANDS)) {
        let bs = &MemoryBlockstore::new();
        let mut state = deploy(bs);
        let mut ledger = Ledger::wrap(bs, &mut state);

        for command in &commands {
            apply(&mut ledger, command);
            prop_assert_eq!(ledger.total_supply(), tokens(INITIAL_SUPPLY));
            let summary = ledger.check_invariants().unwrap();
            prop_assert_eq!(summary.total_supply, tokens(INITIAL_SUPPLY));
        }

        let sum = (0..ACCOUNTS)
            .map(|id| ledger.balance_of(&addr(id)).unwrap())
            .fold(TokenAmount::zero(), |acc, b| &acc + &b);
        prop_assert_eq!(sum, tokens(INITIAL_SUPPLY));
        // the null account can never be credited
        prop_assert_eq!(ledger.balance_of(&addr(0)).unwrap(), TokenAmount::zero());
    }

    /// Each accepted command emits exactly one event; rejected commands emit none and change
    /// nothing
    #[test]
    fn prop_rejections_leave_no_trace(
        commands in prop::collection::vec(command(), 1..MAX_COMMANDS)
    ) {
        let bs = &MemoryBlockstore::new();
        let mut state = deploy(bs);
        let mut ledger = Ledger::wrap(bs, &mut state);

        for command in &commands {
            let before = ledger.state().clone();
            let accepted = apply(&mut ledger, command);
            let events = ledger.take_events();
            if accepted {
                prop_assert_eq!(events.len(), 1);
                let is_transfer = matches!(events[0], LedgerEvent::Transfer(_));
                let expects_transfer =
                    matches!(command, Command::Transfer { .. } | Command::TransferFrom { .. });
                prop_assert_eq!(is_transfer, expects_transfer);
            } else {
                prop_assert!(events.is_empty());
                prop_assert_eq!(ledger.state(), &before);
            }
        }
    }
}
