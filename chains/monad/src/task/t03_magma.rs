use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{percent_of, random_amount, to_ether, to_wei};
use crate::utils::balance::{token_balance, GMON};
use crate::utils::gas::GasManager;
use crate::utils::tx::with_selector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use rand::Rng;
use std::time::Duration;

const MAGMA_ADDR: &str = "0x2c9C959516e9AAEdB2C748224a41249202ca8BE7";
const STAKE_SELECTOR: [u8; 4] = [0xd5, 0x57, 0x59, 0x82];
const UNSTAKE_SELECTOR: [u8; 4] = [0x6f, 0xed, 0x1e, 0xa7];
const UNSTAKE_GWEI: f64 = 50.0;
const PHASE_PAUSE: Duration = Duration::from_secs(4);

/// Random stake between 0.001 and 0.005 MON, 4 decimals.
pub fn stake_amount<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    random_amount(rng, 0.001, 0.005, 4)
}

pub fn unstake_calldata(amount: U256) -> Bytes {
    with_selector(UNSTAKE_SELECTOR, &[Token::Uint(amount)])
}

/// Stakes a small random amount of MON for gMON, then unstakes 95% of gMON.
pub struct MagmaTask;

#[async_trait]
impl Task<TaskContext> for MagmaTask {
    fn name(&self) -> &str {
        "magma"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let address = ctx.address();
        let magma_address: Address = MAGMA_ADDR.parse()?;
        let gmon_address: Address = GMON.parse()?;

        let staked = stake_amount(&mut rand::thread_rng());
        ctx.send(
            TransactionRequest::new()
                .to(magma_address)
                .data(with_selector(STAKE_SELECTOR, &[]))
                .value(to_wei(staked)?)
                .gas(GasManager::LIMIT_CALL)
                .gas_price(ctx.gas_manager.fixed_price()),
        )
        .await
        .context("Magma stake failed")?;

        tokio::time::sleep(PHASE_PAUSE).await;

        let gmon = token_balance(&ctx.provider, gmon_address, address).await?;
        if gmon.is_zero() {
            return Ok(TaskResult::ok(
                format!("Staked {} MON, no gMON to unstake yet", staked),
                None,
            ));
        }

        let unstake_amount = percent_of(gmon, 95);
        let unstake = ctx
            .send(
                TransactionRequest::new()
                    .to(magma_address)
                    .data(unstake_calldata(unstake_amount))
                    .gas(GasManager::LIMIT_CALL)
                    .gas_price(ctx.gas_manager.gwei(UNSTAKE_GWEI)),
            )
            .await
            .context("Magma unstake failed")?;

        Ok(TaskResult::ok(
            format!(
                "Staked {} MON, unstaked {:.6} gMON",
                staked,
                to_ether(unstake_amount)
            ),
            Some(unstake.hash_hex()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::amount::round_to;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unstake_calldata() {
        let data = unstake_calldata(U256::from(0x0100u64));
        assert_eq!(&data[..4], &UNSTAKE_SELECTOR);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[34..], &[0x01, 0x00]);
    }

    #[test]
    fn test_stake_amount_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let amount = stake_amount(&mut rng);
            assert!((0.001..=0.005).contains(&amount), "{} out of range", amount);
            assert_eq!(amount, round_to(amount, 4));
            assert!(to_wei(amount).is_ok());
        }
    }

    #[test]
    fn test_stake_amount_is_seed_stable() {
        let a = stake_amount(&mut StdRng::seed_from_u64(42));
        let b = stake_amount(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
