use super::{invalid, parse_bytes, parse_quantity, read_json};
use anyhow::Result;
use ethers::types::{Address, Bytes, U256};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const QUOTE_URL: &str = "https://testnet-pathfinder-v2.monorail.xyz/v1/quote";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    transaction: Option<QuoteTransaction>,
}

#[derive(Debug, Deserialize)]
struct QuoteTransaction {
    #[serde(default)]
    to: Option<String>,
    data: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonorailQuote {
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
}

pub struct MonorailClient {
    http: Client,
    base_url: String,
}

impl MonorailClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: QUOTE_URL.to_string(),
        }
    }

    /// Swap calldata for `amount` (decimal token units) of `from` into `to`.
    pub async fn quote(
        &self,
        from: Address,
        to: Address,
        amount: f64,
        sender: Address,
    ) -> Result<MonorailQuote> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("amount", amount.to_string()),
                ("from", format!("{:?}", from)),
                ("to", format!("{:?}", to)),
                ("slippage", "100".to_string()),
                ("deadline", "60".to_string()),
                ("source", "fe2".to_string()),
                ("sender", format!("{:?}", sender)),
            ])
            .send()
            .await?;

        let body: QuoteResponse = read_json(response, &self.base_url).await?;
        decode_quote(body, &self.base_url)
    }
}

fn decode_quote(body: QuoteResponse, endpoint: &str) -> Result<MonorailQuote> {
    let tx = body
        .transaction
        .ok_or_else(|| invalid(endpoint, "missing transaction"))?;
    let data = parse_bytes(&tx.data).ok_or_else(|| invalid(endpoint, "bad calldata"))?;
    let value = if tx.value.is_null() {
        U256::zero()
    } else {
        parse_quantity(&tx.value).ok_or_else(|| invalid(endpoint, "bad value"))?
    };
    let to = tx.to.as_deref().and_then(|s| s.parse().ok());
    Ok(MonorailQuote { to, data, value })
}
