//! # Core Logic - Gas Configuration
//!
//! Legacy (type 0) gas pricing knobs shared by chain crates. Chain crates
//! own the per-recipe limits; this module only holds prices and the
//! estimate multiplier.

use serde::Deserialize;

/// Configuration for legacy gas pricing
#[derive(Debug, Clone, PartialEq)]
pub struct GasConfig {
    /// Price used by recipes that pin their gas price
    pub fixed_gwei: f64,
    /// Lower bound applied to the network price where a floor is wanted
    pub floor_gwei: f64,
    /// Multiplier applied to `eth_estimateGas` results
    pub estimate_multiplier: f64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            fixed_gwei: 62.0,
            floor_gwei: 50.0,
            estimate_multiplier: 1.2,
        }
    }
}

impl GasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.estimate_multiplier = multiplier;
        self
    }

    pub fn fixed_price_wei(&self) -> u128 {
        gwei_to_wei(self.fixed_gwei)
    }

    /// `max(network, floor)`
    pub fn floored_price_wei(&self, network_wei: u128) -> u128 {
        network_wei.max(gwei_to_wei(self.floor_gwei))
    }

    pub fn padded_limit(&self, estimate: u64) -> u64 {
        (estimate as f64 * self.estimate_multiplier) as u64
    }
}

/// Convert gwei to wei
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * 1e9).round() as u128
}

/// Deserialize helper for GasConfig from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasConfigToml {
    pub fixed_gwei: Option<f64>,
    pub floor_gwei: Option<f64>,
    pub estimate_multiplier: Option<f64>,
}

impl From<GasConfigToml> for GasConfig {
    fn from(toml: GasConfigToml) -> Self {
        let defaults = GasConfig::default();
        Self {
            fixed_gwei: toml.fixed_gwei.unwrap_or(defaults.fixed_gwei),
            floor_gwei: toml.floor_gwei.unwrap_or(defaults.floor_gwei),
            estimate_multiplier: toml
                .estimate_multiplier
                .unwrap_or(defaults.estimate_multiplier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei(1.0), 1_000_000_000);
        assert_eq!(gwei_to_wei(0.01), 10_000_000);
        assert_eq!(gwei_to_wei(62.0), 62_000_000_000);
    }

    #[test]
    fn test_floored_price() {
        let config = GasConfig::default();
        assert_eq!(config.floored_price_wei(1), 50_000_000_000);
        assert_eq!(config.floored_price_wei(70_000_000_000), 70_000_000_000);
    }

    #[test]
    fn test_padded_limit() {
        let config = GasConfig::new().with_multiplier(1.2);
        assert_eq!(config.padded_limit(100_000), 120_000);
    }

    #[test]
    fn test_toml_partial_override() {
        let config: GasConfig = GasConfigToml {
            fixed_gwei: Some(70.0),
            ..Default::default()
        }
        .into();
        assert_eq!(config.fixed_gwei, 70.0);
        assert_eq!(config.floor_gwei, 50.0);
    }
}
