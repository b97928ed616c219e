use crate::task::{Task, TaskContext, TaskResult};
use crate::utils::gas::GasManager;
use crate::utils::tx::with_selector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;

const LIL_CHOGSTARS_ADDR: &str = "0xb33D7138c53e516871977094B249C8f2ab89a4F4";
/// `mint(uint256)`
const MINT_SELECTOR: [u8; 4] = [0xa0, 0x71, 0x2d, 0x68];

pub struct LilChogstarsTask;

#[async_trait]
impl Task<TaskContext> for LilChogstarsTask {
    fn name(&self) -> &str {
        "nft"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult> {
        let nft_address: Address = LIL_CHOGSTARS_ADDR.parse()?;
        let data = with_selector(MINT_SELECTOR, &[Token::Uint(U256::one())]);

        let outcome = ctx
            .send(
                TransactionRequest::new()
                    .to(nft_address)
                    .data(data)
                    .value(U256::zero())
                    .gas(GasManager::LIMIT_CALL)
                    .gas_price(ctx.gas_manager.fixed_price()),
            )
            .await
            .context("Lil Chogstars mint failed")?;

        Ok(TaskResult::ok(
            "Minted 1 Lil Chogstars NFT",
            Some(outcome.hash_hex()),
        ))
    }
}
