use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{percent_of, random_min_out, ratio_of, round_to, to_ether, to_wei};
use crate::utils::balance::{erc20, token_balance, WMON};
use crate::utils::gas::GasManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use tracing::debug;

const ROUTER_ADDR: &str = "0xCa810D095e90Daae6e867c19DF6D9A8C56db2c89";
const BEAN_ADDR: &str = "0x268E4E24E0051EC27b3D27A95977E71cE6875a05";

/// MON paired with each BEAN when adding liquidity, as parts per million.
const BEAN_MON_RATE_PPM: u64 = 83_488;
const MIN_LIQUIDITY_MON: f64 = 0.01;

const ROUTER_ABI: &str = r#"[
    {"type":"function","name":"swapExactETHForTokens","stateMutability":"payable","inputs":[{"name":"amountOutMin","type":"uint256"},{"name":"path","type":"address[]"},{"name":"to","type":"address"},{"name":"deadline","type":"uint256"}],"outputs":[{"name":"amounts","type":"uint256[]"}]},
    {"type":"function","name":"addLiquidityETH","stateMutability":"payable","inputs":[{"name":"token","type":"address"},{"name":"amountTokenDesired","type":"uint256"},{"name":"amountTokenMin","type":"uint256"},{"name":"amountETHMin","type":"uint256"},{"name":"to","type":"address"},{"name":"deadline","type":"uint256"}],"outputs":[{"name":"amountToken","type":"uint256"},{"name":"amountETH","type":"uint256"},{"name":"liquidity","type":"uint256"}]}
]"#;

pub fn router() -> Result<BaseContract> {
    let abi: abi::Abi = serde_json::from_str(ROUTER_ABI)?;
    Ok(BaseContract::from(abi))
}

/// 5% of the MON balance, rounded to 5 decimals.
pub fn swap_amount(balance: U256) -> Result<U256> {
    to_wei(round_to(to_ether(balance) * 0.05, 5))
}

/// Minimum BEAN accepted for a swap: 99% of the input.
pub fn swap_min_out(amount_in: U256) -> U256 {
    percent_of(amount_in, 99)
}

/// Swaps 5% of MON into BEAN, then adds BEAN/MON liquidity.
pub struct BeanTask;

#[async_trait]
impl Task<TaskContext> for BeanTask {
    fn name(&self) -> &str {
        "bean"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let provider = &ctx.provider;
        let address = ctx.address();
        let router_address: Address = ROUTER_ADDR.parse()?;
        let bean_address: Address = BEAN_ADDR.parse()?;
        let wmon_address: Address = WMON.parse()?;
        let router = router()?;

        // 1. Swap MON -> BEAN
        let balance = provider.get_balance(address, None).await?;
        let amount_in = swap_amount(balance)?;
        if amount_in.is_zero() {
            return Ok(TaskResult::skipped("MON balance too low to swap"));
        }

        let swap_data = router.encode(
            "swapExactETHForTokens",
            (
                swap_min_out(amount_in),
                vec![wmon_address, bean_address],
                address,
                TaskContext::deadline(300)?,
            ),
        )?;
        let gas_price = ctx.gas_manager.network_price().await?;
        let swap_tx = TransactionRequest::new()
            .from(address)
            .to(router_address)
            .data(swap_data)
            .value(amount_in);
        let gas = ctx
            .gas_manager
            .estimate_or(&swap_tx.clone().into(), GasManager::LIMIT_SWAP)
            .await;
        let swap = ctx
            .send(swap_tx.gas(gas).gas_price(gas_price))
            .await
            .context("BEAN swap failed")?;
        debug!("BEAN swap tx {}", swap.hash_hex());

        // 2. Approve BEAN for the router
        let approve_data = erc20()?.encode("approve", (router_address, U256::MAX))?;
        let approve_tx = TransactionRequest::new()
            .from(address)
            .to(bean_address)
            .data(approve_data);
        let gas = ctx
            .gas_manager
            .estimate_or(&approve_tx.clone().into(), GasManager::LIMIT_APPROVE)
            .await;
        ctx.send(approve_tx.gas(gas).gas_price(gas_price))
            .await
            .context("BEAN approve failed")?;

        // 3. Add liquidity
        let bean_balance = token_balance(provider, bean_address, address).await?;
        let mon_balance = to_ether(provider.get_balance(address, None).await?);
        if bean_balance.is_zero() || mon_balance < MIN_LIQUIDITY_MON {
            return Ok(TaskResult::ok(
                format!(
                    "Swapped {} MON for BEAN, liquidity skipped (BEAN {}, MON {:.4})",
                    to_ether(amount_in),
                    to_ether(bean_balance),
                    mon_balance
                ),
                Some(swap.hash_hex()),
            ));
        }

        let amount_token = percent_of(bean_balance, 90);
        let amount_eth = ratio_of(amount_token, BEAN_MON_RATE_PPM, 1_000_000);
        let (min_token, min_eth) = {
            let mut rng = rand::thread_rng();
            (
                random_min_out(&mut rng, amount_token),
                random_min_out(&mut rng, amount_eth),
            )
        };

        let liquidity_data = router.encode(
            "addLiquidityETH",
            (
                bean_address,
                amount_token,
                min_token,
                min_eth,
                address,
                TaskContext::deadline(600)?,
            ),
        )?;
        let liquidity_tx = TransactionRequest::new()
            .from(address)
            .to(router_address)
            .data(liquidity_data)
            .value(amount_eth);
        let gas = ctx
            .gas_manager
            .estimate_or(&liquidity_tx.clone().into(), GasManager::LIMIT_SWAP)
            .await;
        let liquidity = ctx
            .send(liquidity_tx.gas(gas).gas_price(gas_price))
            .await
            .context("BEAN addLiquidityETH failed")?;

        Ok(TaskResult::ok(
            format!(
                "Swapped {} MON, added {:.4} BEAN + {:.4} MON liquidity",
                to_ether(amount_in),
                to_ether(amount_token),
                to_ether(amount_eth)
            ),
            Some(liquidity.hash_hex()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_selectors() {
        let router = router().unwrap();
        let to: Address = BEAN_ADDR.parse().unwrap();
        let swap = router
            .encode(
                "swapExactETHForTokens",
                (U256::one(), vec![to, to], to, U256::one()),
            )
            .unwrap();
        assert_eq!(&swap[..4], &[0x7f, 0xf3, 0x6a, 0xb5]);

        let add = router
            .encode(
                "addLiquidityETH",
                (to, U256::one(), U256::one(), U256::one(), to, U256::one()),
            )
            .unwrap();
        assert_eq!(&add[..4], &[0xf3, 0x05, 0xd7, 0x19]);
    }

    #[test]
    fn test_liquidity_pairing() {
        let bean = U256::exp10(18) * 100;
        let token = percent_of(bean, 90);
        let eth = ratio_of(token, BEAN_MON_RATE_PPM, 1_000_000);
        assert_eq!(token, U256::exp10(18) * 90);
        assert_eq!(to_ether(eth), 7.51392);
    }

    #[test]
    fn test_swap_amount_is_five_percent() {
        let two_mon = U256::exp10(18) * 2;
        let amount = swap_amount(two_mon).unwrap();
        assert_eq!(amount, U256::exp10(17));
        assert_eq!(swap_min_out(amount), U256::exp10(15) * 99);

        // 1.23456 MON -> 0.061728, rounded to 0.06173
        let odd = U256::from(123_456u64) * U256::exp10(13);
        assert_eq!(swap_amount(odd).unwrap(), U256::from(6_173u64) * U256::exp10(13));
    }

    #[test]
    fn test_swap_amount_of_empty_wallet_is_zero() {
        assert!(swap_amount(U256::zero()).unwrap().is_zero());
        // dust below 5 decimals after taking 5%
        assert!(swap_amount(U256::from(1_000u64)).unwrap().is_zero());
        assert!(swap_min_out(U256::zero()).is_zero());
    }
}
