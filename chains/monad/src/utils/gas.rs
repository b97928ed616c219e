use anyhow::Result;
use core_logic::{gwei_to_wei, GasConfig};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::debug;

/// Legacy gas pricing for Monad recipes.
#[derive(Clone, Debug)]
pub struct GasManager {
    config: GasConfig,
    provider: Arc<Provider<Http>>,
}

impl GasManager {
    pub const LIMIT_APPROVE: u64 = 100_000;
    pub const LIMIT_MONORAIL_APPROVE: u64 = 80_000;
    pub const LIMIT_CALL: u64 = 200_000;
    pub const LIMIT_SWAP: u64 = 300_000;
    pub const LIMIT_MONORAIL_SWAP: u64 = 400_000;

    pub fn new(provider: Arc<Provider<Http>>) -> Self {
        Self {
            config: GasConfig::default(),
            provider,
        }
    }

    pub fn with_config(mut self, config: GasConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn network_price(&self) -> Result<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    /// Configured pinned price (62 gwei by default).
    pub fn fixed_price(&self) -> U256 {
        U256::from(self.config.fixed_price_wei())
    }

    /// Explicit pinned price, e.g. 52 gwei for a Kinza supply.
    pub fn gwei(&self, gwei: f64) -> U256 {
        U256::from(gwei_to_wei(gwei))
    }

    /// `max(network, floor)`
    pub async fn floored_price(&self) -> Result<U256> {
        let network = self.network_price().await?;
        Ok(U256::from(self.config.floored_price_wei(network.as_u128())))
    }

    /// `eth_estimateGas` padded by the configured multiplier, or `fallback`
    /// when estimation fails.
    pub async fn estimate_or(&self, tx: &TypedTransaction, fallback: u64) -> U256 {
        match self.provider.estimate_gas(tx, None).await {
            Ok(estimate) => U256::from(self.config.padded_limit(estimate.as_u64())),
            Err(e) => {
                debug!("Gas estimation failed, using {}: {}", fallback, e);
                U256::from(fallback)
            }
        }
    }
}
