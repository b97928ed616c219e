use crate::api::BlinkClient;
use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::amount::{random_amount, to_units};
use crate::utils::balance::{token_balance, CHOG, DAK, YAKI};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;

/// Buys a token with a small random amount of MON through the swap widget
/// on the Monad testnet site. The API returns a complete transaction.
pub struct MainSiteSwapTask {
    key: &'static str,
    symbol: &'static str,
    token: &'static str,
}

impl MainSiteSwapTask {
    pub fn chog() -> Self {
        Self {
            key: "chog",
            symbol: "CHOG",
            token: CHOG,
        }
    }

    pub fn dak() -> Self {
        Self {
            key: "dak",
            symbol: "DAK",
            token: DAK,
        }
    }

    pub fn yaki() -> Self {
        Self {
            key: "yaki",
            symbol: "YAKI",
            token: YAKI,
        }
    }
}

#[async_trait]
impl Task<TaskContext> for MainSiteSwapTask {
    fn name(&self) -> &str {
        self.key
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let address = ctx.address();
        let token: Address = self.token.parse()?;
        let amount = random_amount(&mut rand::thread_rng(), 0.0001, 0.001, 6);

        let client = BlinkClient::new(ctx.http.clone(), ctx.config.blink_api_key.clone());
        let quoted = client
            .swap_transaction(token, self.symbol, amount, address)
            .await
            .with_context(|| format!("{} quote failed", self.symbol))?;

        let outcome = ctx
            .send(
                TransactionRequest::new()
                    .to(quoted.to)
                    .data(quoted.data)
                    .value(quoted.value)
                    .gas(quoted.gas)
                    .gas_price(quoted.gas_price),
            )
            .await
            .with_context(|| format!("{} buy failed", self.symbol))?;

        let held = token_balance(&ctx.provider, token, address)
            .await
            .map(|raw| to_units(raw, 18))
            .unwrap_or_default();

        Ok(TaskResult::ok(
            format!(
                "Bought {} for {} MON, holding {:.4} {}",
                self.symbol, amount, held, self.symbol
            ),
            Some(outcome.hash_hex()),
        ))
    }
}
