use anyhow::{Context, Result};
use ethers::abi::Abi;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::debug;

use super::amount::{to_ether, to_units};

pub const ERC20_ABI: &str = r#"[
    {"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"type":"function"},
    {"constant":true,"inputs":[],"name":"decimals","outputs":[{"name":"","type":"uint8"}],"type":"function"},
    {"constant":false,"inputs":[{"name":"_spender","type":"address"},{"name":"_value","type":"uint256"}],"name":"approve","outputs":[{"name":"","type":"bool"}],"type":"function"}
]"#;

pub const CHOG: &str = "0xE0590015A873bF326bd645c3E1266d4db41C4E6B";
pub const YAKI: &str = "0xfe140e1dCe99Be9F4F15d657CD9b7BF622270C50";
pub const DAK: &str = "0x0F0BDEbF0F83cD1EE3974779Bcb7315f9808c714";
pub const WMON: &str = "0x760AfE86e5de5fa0Ee542fc7B7B713e1c5425701";
pub const WETH: &str = "0x836047a99e11F376522B447bffb6e3495Dd0637c";
pub const GMON: &str = "0xaEef2f6B429Cb59C9B2D7bB2141ADa993E8571c3";

/// Tokens shown by the balance report, in display order.
pub const TRACKED_TOKENS: [(&str, &str); 6] = [
    ("CHOG", CHOG),
    ("YAKI", YAKI),
    ("DAK", DAK),
    ("WMON", WMON),
    ("ETH", WETH),
    ("gMON", GMON),
];

pub fn erc20_abi() -> Result<Abi> {
    serde_json::from_str(ERC20_ABI).context("Invalid ERC20 ABI")
}

/// Encoder for ERC20 calldata (`approve`, `balanceOf`).
pub fn erc20() -> Result<BaseContract> {
    Ok(BaseContract::from(erc20_abi()?))
}

pub async fn token_balance(
    provider: &Provider<Http>,
    token: Address,
    owner: Address,
) -> Result<U256> {
    let contract = Contract::new(token, erc20_abi()?, Arc::new(provider.clone()));
    contract
        .method::<_, U256>("balanceOf", owner)?
        .call()
        .await
        .with_context(|| format!("Failed to read balance of {:?}", token))
}

pub async fn token_decimals(provider: &Provider<Http>, token: Address) -> u8 {
    let call = async {
        let contract = Contract::new(token, erc20_abi()?, Arc::new(provider.clone()));
        let decimals: u8 = contract.method("decimals", ())?.call().await?;
        anyhow::Ok(decimals)
    };
    call.await.unwrap_or(18)
}

/// Native MON balance in ether units.
pub async fn native_balance(provider: &Provider<Http>, owner: Address) -> Result<f64> {
    let wei = provider
        .get_balance(owner, None)
        .await
        .context("Failed to fetch native balance")?;
    Ok(to_ether(wei))
}

/// Balances of [`TRACKED_TOKENS`]; tokens that fail to load are left out.
pub async fn token_report(provider: &Provider<Http>, owner: Address) -> Vec<(String, f64)> {
    let mut report = Vec::with_capacity(TRACKED_TOKENS.len());
    for (symbol, addr) in TRACKED_TOKENS {
        let Ok(token) = addr.parse::<Address>() else {
            continue;
        };
        match token_balance(provider, token, owner).await {
            Ok(raw) => {
                let decimals = token_decimals(provider, token).await;
                report.push((symbol.to_string(), to_units(raw, decimals)));
            }
            Err(e) => debug!("{} balance unavailable: {:#}", symbol, e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_tokens_parse() {
        for (symbol, addr) in TRACKED_TOKENS {
            assert!(addr.parse::<Address>().is_ok(), "{} address invalid", symbol);
        }
    }

    #[test]
    fn test_approve_encoding_selector() {
        let contract = erc20().unwrap();
        let spender: Address = WMON.parse().unwrap();
        let data = contract.encode("approve", (spender, U256::MAX)).unwrap();
        assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
    }
}
