use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{random_amount, to_wei};
use crate::utils::balance::WMON;
use crate::utils::gas::GasManager;
use crate::utils::tx::with_selector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;

/// `deposit()`
const DEPOSIT_SELECTOR: [u8; 4] = [0xd0, 0xe3, 0x0d, 0xb0];

/// Wraps a small random amount of MON into WMON.
pub struct PandariaTask;

#[async_trait]
impl Task<TaskContext> for PandariaTask {
    fn name(&self) -> &str {
        "pandaria"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let wmon_address: Address = WMON.parse()?;
        let amount = random_amount(&mut rand::thread_rng(), 0.0001, 0.001, 6);

        let outcome = ctx
            .send(
                TransactionRequest::new()
                    .to(wmon_address)
                    .data(with_selector(DEPOSIT_SELECTOR, &[]))
                    .value(to_wei(amount)?)
                    .gas(GasManager::LIMIT_APPROVE)
                    .gas_price(ctx.gas_manager.fixed_price()),
            )
            .await
            .context("WMON deposit failed")?;

        Ok(TaskResult::ok(
            format!("Wrapped {} MON to WMON", amount),
            Some(outcome.hash_hex()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_selector_matches_signature() {
        assert_eq!(ethers::utils::id("deposit()"), DEPOSIT_SELECTOR);
    }
}
