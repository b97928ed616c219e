use crate::api::MonorailClient;
use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{monorail_amount, to_ether, to_wei};
use crate::utils::balance::{erc20, token_balance, CHOG, DAK, WMON, YAKI};
use crate::utils::gas::GasManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

const ROUTER_ADDR: &str = "0xC995498c22a012353FAE7eCC701810D673E25794";
const MIN_BALANCE: f64 = 0.05;

type SwapToken = (&'static str, &'static str);

const SWAP_TOKENS: [SwapToken; 4] = [
    ("CHOG", CHOG),
    ("YAKI", YAKI),
    ("DAK", DAK),
    ("WMON", WMON),
];

/// Two distinct entries of the swap token list, `(from, to)`.
pub fn pick_pair<R: Rng + ?Sized>(rng: &mut R) -> (SwapToken, SwapToken) {
    let picked: Vec<_> = SWAP_TOKENS.choose_multiple(rng, 2).copied().collect();
    (picked[0], picked[1])
}

/// Swaps a random slice of one token into another through Monorail.
pub struct MonorailTask;

#[async_trait]
impl Task<TaskContext> for MonorailTask {
    fn name(&self) -> &str {
        "monorail"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let address = ctx.address();
        let router_address: Address = ROUTER_ADDR.parse()?;
        let ((from_symbol, from_addr), (to_symbol, to_addr)) = pick_pair(&mut rand::thread_rng());
        let from_token: Address = from_addr.parse()?;
        let to_token: Address = to_addr.parse()?;

        let token_bal = to_ether(token_balance(&ctx.provider, from_token, address).await?);
        let mon_bal = to_ether(ctx.provider.get_balance(address, None).await?);
        if token_bal <= MIN_BALANCE || mon_bal <= MIN_BALANCE {
            return Ok(TaskResult::skipped(format!(
                "Not enough {} or MON to swap ({:.4} / {:.4})",
                from_symbol, token_bal, mon_bal
            )));
        }
        let Some(amount) = monorail_amount(&mut rand::thread_rng(), token_bal) else {
            return Ok(TaskResult::skipped(format!("{} balance too small", from_symbol)));
        };

        let gas_price = ctx.gas_manager.floored_price().await?;
        let approve_data = erc20()?.encode("approve", (router_address, to_wei(amount)?))?;
        ctx.send(
            TransactionRequest::new()
                .to(from_token)
                .data(approve_data)
                .gas(GasManager::LIMIT_MONORAIL_APPROVE)
                .gas_price(gas_price),
        )
        .await
        .with_context(|| format!("{} approve failed", from_symbol))?;

        let quote = MonorailClient::new(ctx.http.clone())
            .quote(from_token, to_token, amount, address)
            .await
            .context("Monorail quote failed")?;

        let swap = ctx
            .send(
                TransactionRequest::new()
                    .to(router_address)
                    .data(quote.data)
                    .value(quote.value)
                    .gas(GasManager::LIMIT_MONORAIL_SWAP)
                    .gas_price(ctx.gas_manager.floored_price().await?),
            )
            .await
            .context("Monorail swap failed")?;

        Ok(TaskResult::ok(
            format!("Swapped {} {} to {}", amount, from_symbol, to_symbol),
            Some(swap.hash_hex()),
        ))
    }
}
