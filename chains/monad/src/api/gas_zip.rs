use super::{invalid, parse_bytes, read_json};
use anyhow::Result;
use ethers::types::{Address, Bytes, U256};
use reqwest::Client;
use serde::Deserialize;

const QUOTE_BASE: &str = "https://backend.gas.zip/v2/quotes";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    calldata: Option<String>,
}

/// gas.zip deposit quotes.
pub struct GasZipClient {
    http: Client,
    from_chain: u64,
    to_chain: u64,
}

impl GasZipClient {
    pub fn new(http: Client, from_chain: u64, to_chain: u64) -> Self {
        Self {
            http,
            from_chain,
            to_chain,
        }
    }

    pub fn quote_url(&self, value_wei: U256) -> String {
        format!(
            "{}/{}/{}/{}",
            QUOTE_BASE, self.from_chain, value_wei, self.to_chain
        )
    }

    /// Deposit calldata crediting `recipient` on the destination chain.
    pub async fn quote(&self, value_wei: U256, recipient: Address) -> Result<Bytes> {
        let url = self.quote_url(value_wei);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("from", format!("{:?}", recipient)),
                ("to", format!("{:?}", recipient)),
            ])
            .send()
            .await?;

        let body: QuoteResponse = read_json(response, &url).await?;
        body.calldata
            .as_deref()
            .and_then(parse_bytes)
            .ok_or_else(|| invalid(&url, "missing calldata"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_url_layout() {
        let client = GasZipClient::new(Client::new(), 42161, 10143);
        let url = client.quote_url(U256::from(800_000_000_000_000u64));
        assert_eq!(
            url,
            "https://backend.gas.zip/v2/quotes/42161/800000000000000/10143"
        );
    }
}
