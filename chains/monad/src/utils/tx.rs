use anyhow::{bail, Context, Result};
use ethers::abi::{self, Token};
use ethers::prelude::*;

/// Result of a broadcast transaction. `block` is `None` when the receipt
/// was not awaited.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub hash: TxHash,
    pub block: Option<U64>,
}

impl TxOutcome {
    pub fn hash_hex(&self) -> String {
        format!("{:?}", self.hash)
    }
}

/// Calldata from a raw 4-byte selector and ABI-encoded arguments.
pub fn with_selector(selector: [u8; 4], args: &[Token]) -> Bytes {
    let mut data = selector.to_vec();
    data.extend(abi::encode(args));
    Bytes::from(data)
}

/// Signs and broadcasts a legacy transaction.
///
/// The nonce is read from the `pending` block. With `wait` set, a receipt
/// is awaited and a reverted status is an error.
pub async fn send_legacy(
    provider: &Provider<Http>,
    wallet: &LocalWallet,
    tx: TransactionRequest,
    wait: bool,
) -> Result<TxOutcome> {
    let from = wallet.address();
    let nonce = provider
        .get_transaction_count(from, Some(BlockNumber::Pending.into()))
        .await
        .context("Failed to fetch pending nonce")?;

    let tx = tx.from(from).nonce(nonce).chain_id(wallet.chain_id());

    let client = SignerMiddleware::new(provider.clone(), wallet.clone());
    let pending_tx = client
        .send_transaction(tx, None)
        .await
        .context("Failed to broadcast transaction")?;
    let hash = pending_tx.tx_hash();

    if !wait {
        return Ok(TxOutcome { hash, block: None });
    }

    let receipt = pending_tx
        .await?
        .context("Failed to get transaction receipt")?;
    if receipt.status != Some(U64::from(1)) {
        bail!("Transaction {:?} reverted", hash);
    }

    Ok(TxOutcome {
        hash,
        block: receipt.block_number,
    })
}
