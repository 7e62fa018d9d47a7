//! Conversion between human-facing decimal figures ("1000000", "0.5") and base units

use fvm_shared::bigint::BigInt;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("figure is empty")]
    Empty,
    #[error("figure {0:?} contains a character that is not a decimal digit")]
    InvalidDigit(String),
    #[error("figure {0:?} has more than one decimal point")]
    MultiplePoints(String),
    #[error("figure {figure:?} has more than {decimals} fractional digits")]
    TooPrecise { figure: String, decimals: u8 },
}

type Result<T> = std::result::Result<T, UnitsError>;

/// Parses a non-negative decimal figure expressed in whole tokens into base units
///
/// Accepts digits with at most one `.`; the fractional part may have up to `decimals` digits.
/// A leading or trailing point is allowed (".5", "5.") but signs, exponents, separators and
/// whitespace are not.
pub fn parse_units(figure: &str, decimals: u8) -> Result<TokenAmount> {
    if figure.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = match figure.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.contains('.') {
                return Err(UnitsError::MultiplePoints(figure.to_owned()));
            }
            (whole, fraction)
        }
        None => (figure, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::InvalidDigit(figure.to_owned()));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(UnitsError::InvalidDigit(figure.to_owned()));
    }
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooPrecise { figure: figure.to_owned(), decimals });
    }

    // right-pad the fraction so the concatenation is already in base units
    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

    let atto = BigInt::parse_bytes(digits.as_bytes(), 10).unwrap_or_else(BigInt::zero);
    Ok(TokenAmount::from_atto(atto))
}

/// Formats base units as a decimal figure in whole tokens, trimming trailing fractional zeros
pub fn format_units(amount: &TokenAmount, decimals: u8) -> String {
    let atto = amount.atto();
    let sign = if atto.sign() == fvm_shared::bigint::Sign::Minus { "-" } else { "" };
    let magnitude = atto.magnitude().to_string();

    let decimals = decimals as usize;
    let (whole, fraction) = if magnitude.len() > decimals {
        magnitude.split_at(magnitude.len() - decimals)
    } else {
        ("0", magnitude.as_str())
    };

    let fraction = format!("{:0>width$}", fraction, width = decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{fraction}")
    }
}
