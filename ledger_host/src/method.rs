use frc42_dispatch::method_hash;
use fvm_shared::MethodNum;

pub const NAME: MethodNum = method_hash!("Name");
pub const SYMBOL: MethodNum = method_hash!("Symbol");
pub const DECIMALS: MethodNum = method_hash!("Decimals");
pub const TOTAL_SUPPLY: MethodNum = method_hash!("TotalSupply");
pub const BALANCE_OF: MethodNum = method_hash!("BalanceOf");
pub const ALLOWANCE: MethodNum = method_hash!("Allowance");
pub const TRANSFER: MethodNum = method_hash!("Transfer");
pub const APPROVE: MethodNum = method_hash!("Approve");
pub const TRANSFER_FROM: MethodNum = method_hash!("TransferFrom");
pub const INCREASE_ALLOWANCE: MethodNum = method_hash!("IncreaseAllowance");
pub const DECREASE_ALLOWANCE: MethodNum = method_hash!("DecreaseAllowance");

/// Resolves a method number back to its exported name
pub fn method_name(method: MethodNum) -> Option<&'static str> {
    let name = match method {
        NAME => "Name",
        SYMBOL => "Symbol",
        DECIMALS => "Decimals",
        TOTAL_SUPPLY => "TotalSupply",
        BALANCE_OF => "BalanceOf",
        ALLOWANCE => "Allowance",
        TRANSFER => "Transfer",
        APPROVE => "Approve",
        TRANSFER_FROM => "TransferFrom",
        INCREASE_ALLOWANCE => "IncreaseAllowance",
        DECREASE_ALLOWANCE => "DecreaseAllowance",
        _ => return None,
    };
    Some(name)
}
