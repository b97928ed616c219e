use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{percent_of, to_ether};
use crate::utils::balance::{erc20, token_balance, DAK};
use crate::utils::gas::GasManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use std::time::Duration;

const POOL_ADDR: &str = "0x590B03D84441c1277f32784d1fbC22Fe18b1eEe0";
const SUPPLY_GWEI: f64 = 52.0;
const PHASE_PAUSE: Duration = Duration::from_secs(4);

const POOL_ABI: &str = r#"[
    {"type":"function","name":"supply","stateMutability":"nonpayable","inputs":[{"name":"asset","type":"address"},{"name":"amount","type":"uint256"},{"name":"onBehalfOf","type":"address"},{"name":"referralCode","type":"uint16"}],"outputs":[]},
    {"type":"function","name":"withdraw","stateMutability":"nonpayable","inputs":[{"name":"asset","type":"address"},{"name":"amount","type":"uint256"},{"name":"to","type":"address"}],"outputs":[{"name":"","type":"uint256"}]}
]"#;

pub fn pool() -> Result<BaseContract> {
    let abi: abi::Abi = serde_json::from_str(POOL_ABI)?;
    Ok(BaseContract::from(abi))
}

/// Supplies 5% of the DAK balance to the Kinza pool, then withdraws it all.
pub struct KinzaTask;

#[async_trait]
impl Task<TaskContext> for KinzaTask {
    fn name(&self) -> &str {
        "kinza"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let address = ctx.address();
        let pool_address: Address = POOL_ADDR.parse()?;
        let dak_address: Address = DAK.parse()?;
        let pool = pool()?;

        let dak_balance = token_balance(&ctx.provider, dak_address, address).await?;
        let amount = percent_of(dak_balance, 5);
        if amount.is_zero() {
            return Ok(TaskResult::skipped("No DAK to supply"));
        }

        let approve_data = erc20()?.encode("approve", (pool_address, U256::MAX))?;
        ctx.send(
            TransactionRequest::new()
                .to(dak_address)
                .data(approve_data)
                .gas(GasManager::LIMIT_APPROVE)
                .gas_price(ctx.gas_manager.fixed_price()),
        )
        .await
        .context("DAK approve failed")?;

        let supply_data = pool.encode("supply", (dak_address, amount, address, 0u16))?;
        let supply = ctx
            .send(
                TransactionRequest::new()
                    .to(pool_address)
                    .data(supply_data)
                    .gas(GasManager::LIMIT_SWAP)
                    .gas_price(ctx.gas_manager.gwei(SUPPLY_GWEI)),
            )
            .await
            .context("Kinza supply failed")?;

        tokio::time::sleep(PHASE_PAUSE).await;

        let withdraw_data = pool.encode("withdraw", (dak_address, U256::MAX, address))?;
        let withdraw = ctx
            .send(
                TransactionRequest::new()
                    .to(pool_address)
                    .data(withdraw_data)
                    .gas(GasManager::LIMIT_SWAP)
                    .gas_price(ctx.gas_manager.network_price().await?),
            )
            .await
            .with_context(|| format!("Kinza withdraw failed after supply {}", supply.hash_hex()))?;

        Ok(TaskResult::ok(
            format!("Supplied and withdrew {:.6} DAK on Kinza", to_ether(amount)),
            Some(withdraw.hash_hex()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_selectors() {
        let pool = pool().unwrap();
        let a: Address = DAK.parse().unwrap();
        let supply = pool.encode("supply", (a, U256::one(), a, 0u16)).unwrap();
        assert_eq!(&supply[..4], &[0x61, 0x7b, 0xa0, 0x37]);
        let withdraw = pool.encode("withdraw", (a, U256::MAX, a)).unwrap();
        assert_eq!(&withdraw[..4], &[0x69, 0x32, 0x8d, 0xec]);
    }
}
