//! Decimal scaling between display units and on-chain base units.
//!
//! Users type `1000` zUSD; the contract stores `1000 × 10^6`. Scaling goes
//! up before encryption, descaling comes down after decryption, and both
//! are exact integer arithmetic. No floats anywhere near money.

use crate::config::{MAX_ENCRYPTED_AMOUNT, MAX_TOKEN_DECIMALS};
use crate::error::EngineError;

/// `10^decimals`, or an error for decimal counts we refuse to handle.
pub fn decimal_factor(decimals: u8) -> Result<u128, EngineError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(EngineError::InvalidAmount(format!(
            "token decimals {decimals} exceed the supported maximum of {MAX_TOKEN_DECIMALS}"
        )));
    }
    Ok(10u128.pow(decimals as u32))
}

/// Scales a whole-unit `amount` to base units. Fails if the result does not
/// fit an encrypted 64-bit amount.
pub fn scale(amount: u64, decimals: u8) -> Result<u64, EngineError> {
    let scaled = (amount as u128) * decimal_factor(decimals)?;
    if scaled > MAX_ENCRYPTED_AMOUNT as u128 {
        return Err(EngineError::InvalidAmount(format!(
            "{amount} with {decimals} decimals overflows a 64-bit encrypted amount"
        )));
    }
    Ok(scaled as u64)
}

/// Whole units contained in `raw` base units. Any fractional remainder is
/// truncated; use [`format_units`] to display it.
pub fn descale(raw: u128, decimals: u8) -> Result<u128, EngineError> {
    Ok(raw / decimal_factor(decimals)?)
}

/// Renders base units as a decimal string with trailing zeros trimmed:
/// `1_000_000_000` at 6 decimals is `"1000"`, `500_000` is `"0.5"`.
pub fn format_units(raw: u128, decimals: u8) -> Result<String, EngineError> {
    let factor = decimal_factor(decimals)?;
    let whole = raw / factor;
    let frac = raw % factor;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    Ok(format!("{whole}.{}", frac.trim_end_matches('0')))
}
