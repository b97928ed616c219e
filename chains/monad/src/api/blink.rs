use super::{invalid, parse_body, parse_bytes, parse_quantity, read_json};
use anyhow::Result;
use ethers::types::{Address, Bytes, U256};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const BLINK_URL: &str = "https://api.dial.to/v1/blink";
const SWAP_CONFIRM_URL: &str = "https://uniswap.api.dial.to/swap/confirm";
const SITE_ORIGIN: &str = "https://testnet.monad.xyz";

#[derive(Debug, Deserialize)]
struct BlinkResponse {
    /// JSON-encoded transaction object
    transaction: String,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    to: String,
    #[serde(default)]
    value: Value,
    data: String,
    gas: Value,
    #[serde(rename = "gasPrice")]
    gas_price: GasPrice,
}

#[derive(Debug, Deserialize)]
struct GasPrice {
    value: Value,
}

/// Ready-to-sign swap returned by the blink API.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas: U256,
    pub gas_price: U256,
}

pub struct BlinkClient {
    http: Client,
    api_key: Option<String>,
}

impl BlinkClient {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    /// Swap of `amount` MON into `output_token` for `account`.
    pub async fn swap_transaction(
        &self,
        output_token: Address,
        symbol: &str,
        amount: f64,
        account: Address,
    ) -> Result<BlinkTransaction> {
        let api_url = swap_confirm_url(output_token, symbol, amount)?;

        let mut request = self
            .http
            .post(BLINK_URL)
            .query(&[("apiUrl", api_url.as_str())])
            .header("origin", SITE_ORIGIN)
            .header("referer", format!("{}/", SITE_ORIGIN))
            .json(&json!({
                "account": format!("{:?}", account),
                "type": "transaction",
            }));
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header("x-blink-client-key", key);
        }

        let body: BlinkResponse = read_json(request.send().await?, BLINK_URL).await?;
        decode_transaction(&body.transaction)
    }
}

fn swap_confirm_url(output_token: Address, symbol: &str, amount: f64) -> Result<Url> {
    Ok(Url::parse_with_params(
        SWAP_CONFIRM_URL,
        &[
            ("chain", "monad-testnet".to_string()),
            ("inputCurrency", "native".to_string()),
            ("outputCurrency", format!("{:?}", output_token)),
            ("inputSymbol", "MON".to_string()),
            ("outputSymbol", symbol.to_string()),
            ("inputDecimals", "18".to_string()),
            ("outputDecimals", "18".to_string()),
            ("amount", amount.to_string()),
        ],
    )?)
}

fn decode_transaction(encoded: &str) -> Result<BlinkTransaction> {
    let raw: RawTransaction = parse_body(encoded, BLINK_URL)?;
    let value = if raw.value.is_null() {
        U256::zero()
    } else {
        parse_quantity(&raw.value).ok_or_else(|| invalid(BLINK_URL, "bad value"))?
    };

    Ok(BlinkTransaction {
        to: raw
            .to
            .parse()
            .map_err(|_| invalid(BLINK_URL, "bad destination address"))?,
        value,
        data: parse_bytes(&raw.data).ok_or_else(|| invalid(BLINK_URL, "bad calldata"))?,
        gas: parse_quantity(&raw.gas).ok_or_else(|| invalid(BLINK_URL, "bad gas"))?,
        gas_price: parse_quantity(&raw.gas_price.value)
            .ok_or_else(|| invalid(BLINK_URL, "bad gas price"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nested_transaction() {
        let outer = r#"{"transaction":"{\"to\":\"0xE0590015A873bF326bd645c3E1266d4db41C4E6B\",\"value\":\"0x5af3107a4000\",\"data\":\"0x3593564c\",\"gas\":\"0x30d40\",\"gasPrice\":{\"value\":\"52000000000\"}}"}"#;
        let body: BlinkResponse = parse_body(outer, BLINK_URL).unwrap();
        let tx = decode_transaction(&body.transaction).unwrap();

        assert_eq!(tx.value, U256::from(100_000_000_000_000u64));
        assert_eq!(tx.gas, U256::from(200_000u64));
        assert_eq!(tx.gas_price, U256::from(52_000_000_000u64));
        assert_eq!(tx.data.len(), 4);
    }

    #[test]
    fn test_decode_rejects_missing_gas_price() {
        let inner = r#"{"to":"0xE0590015A873bF326bd645c3E1266d4db41C4E6B","data":"0x","gas":1}"#;
        assert!(decode_transaction(inner).is_err());
    }

    #[test]
    fn test_swap_confirm_url() {
        let token: Address = "0xE0590015A873bF326bd645c3E1266d4db41C4E6B".parse().unwrap();
        let url = swap_confirm_url(token, "CHOG", 0.0005).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("outputSymbol=CHOG"));
        assert!(query.contains("amount=0.0005"));
        assert!(query.contains("chain=monad-testnet"));
    }
}
