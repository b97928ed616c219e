//! Amount heuristics used by the recipes.
//!
//! Random amounts take the RNG as a parameter so a seeded `StdRng` gives
//! reproducible values in tests.

use anyhow::{Context, Result};
use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};
use rand::Rng;

/// `value * pct / 100`
pub fn percent_of(value: U256, pct: u64) -> U256 {
    value * U256::from(pct) / U256::from(100)
}

/// `value * num / den`, for ratios that do not fit a whole percent.
pub fn ratio_of(value: U256, num: u64, den: u64) -> U256 {
    value * U256::from(num) / U256::from(den)
}

/// Uniform value in `[min, max]` rounded to `decimals` places.
pub fn random_amount<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64, decimals: u32) -> f64 {
    let raw = if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    };
    round_to(raw, decimals).clamp(min, max.max(min))
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Random slippage floor between 90% and 98% of `amount`.
pub fn random_min_out<R: Rng + ?Sized>(rng: &mut R, amount: U256) -> U256 {
    let permille: u64 = rng.gen_range(900..=980);
    ratio_of(amount, permille, 1000)
}

/// Monorail input: `[0.0001, min(10% of balance, balance)]`, 6 places.
/// `None` when the balance is too small to swap.
pub fn monorail_amount<R: Rng + ?Sized>(rng: &mut R, token_balance: f64) -> Option<f64> {
    const MIN: f64 = 0.0001;
    let max = (token_balance * 0.1).min(token_balance);
    if max <= MIN {
        return None;
    }
    Some(random_amount(rng, MIN, max, 6))
}

pub fn to_wei(amount: f64) -> Result<U256> {
    parse_ether(amount).with_context(|| format!("Invalid ether amount {}", amount))
}

pub fn to_ether(wei: U256) -> f64 {
    format_ether(wei).parse::<f64>().unwrap_or(0.0)
}

/// Converts a raw token amount with `decimals` into a float.
pub fn to_units(raw: U256, decimals: u8) -> f64 {
    ethers::utils::format_units(raw, decimals as u32)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}
