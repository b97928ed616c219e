use crate::api::{GasZipClient, PriceClient};
use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{round_to, to_ether, to_wei};
use crate::utils::http::build_provider;
use crate::utils::tx::send_legacy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;

const GAS_ZIP_DEPOSIT: &str = "0x391E7C679d29bD940d63be94AD22A25d25b5A604";
const DEPOSIT_GAS: u64 = 47_000;
const DEPOSIT_GWEI: f64 = 0.01;
pub const DEFAULT_USD: f64 = 2.0;

/// ETH amount worth `usd` at `eth_price`, rounded to 8 places.
pub fn eth_for_usd(usd: f64, eth_price: f64) -> f64 {
    round_to(usd / eth_price, 8)
}

/// Bridges a few dollars of Arbitrum ETH into testnet MON via gas.zip.
pub struct BuyMonadTask {
    usd: f64,
}

impl BuyMonadTask {
    pub fn new(usd: f64) -> Self {
        Self { usd }
    }
}

impl Default for BuyMonadTask {
    fn default() -> Self {
        Self::new(DEFAULT_USD)
    }
}

#[async_trait]
impl Task<TaskContext> for BuyMonadTask {
    fn name(&self) -> &str {
        "buy_monad"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let address = ctx.address();
        let arb_provider = build_provider(&ctx.config.arb_rpc_url, ctx.http.clone())?;
        let arb_wallet = ctx.wallet.clone().with_chain_id(ctx.config.arb_chain_id);

        let eth_price = PriceClient::new(ctx.http.clone())
            .eth_usd()
            .await
            .context("ETH price lookup failed")?;
        let amount_eth = eth_for_usd(self.usd, eth_price);
        let value = to_wei(amount_eth)?;

        let gas_price = ctx.gas_manager.gwei(DEPOSIT_GWEI);
        let balance = arb_provider.get_balance(address, None).await?;
        if balance < value + gas_price * U256::from(DEPOSIT_GAS) {
            return Ok(TaskResult::skipped(format!(
                "Arbitrum balance {:.6} ETH below {} ETH deposit",
                to_ether(balance),
                amount_eth
            )));
        }

        let gas_zip =
            GasZipClient::new(ctx.http.clone(), ctx.config.arb_chain_id, ctx.config.chain_id);
        let calldata = gas_zip
            .quote(value, address)
            .await
            .context("gas.zip quote failed")?;

        let outcome = send_legacy(
            &arb_provider,
            &arb_wallet,
            TransactionRequest::new()
                .to(GAS_ZIP_DEPOSIT.parse::<Address>()?)
                .data(calldata)
                .value(value)
                .gas(DEPOSIT_GAS)
                .gas_price(gas_price),
            ctx.config.wait_for_receipt,
        )
        .await
        .context("gas.zip deposit failed")?;

        Ok(TaskResult::ok(
            format!("Bridged {} ETH (${}) to MON via gas.zip", amount_eth, self.usd),
            Some(outcome.hash_hex()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_for_usd() {
        assert_eq!(eth_for_usd(2.0, 2000.0), 0.001);
        assert_eq!(eth_for_usd(2.0, 3000.0), 0.00066667);
    }
}
