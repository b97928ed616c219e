use super::{invalid, read_json};
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

#[derive(Debug, Deserialize)]
struct PriceResponse(HashMap<String, HashMap<String, f64>>);

pub struct PriceClient {
    http: Client,
}

impl PriceClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub async fn eth_usd(&self) -> Result<f64> {
        let response = self
            .http
            .get(PRICE_URL)
            .query(&[("ids", "ethereum"), ("vs_currencies", "usd")])
            .send()
            .await?;
        let body: PriceResponse = read_json(response, PRICE_URL).await?;
        extract_price(&body, "ethereum", "usd")
    }
}

fn extract_price(body: &PriceResponse, id: &str, currency: &str) -> Result<f64> {
    body.0
        .get(id)
        .and_then(|m| m.get(currency))
        .copied()
        .filter(|p| *p > 0.0)
        .ok_or_else(|| invalid(PRICE_URL, format!("no {} price for {}", currency, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_body;

    #[test]
    fn test_extract_price() {
        let body: PriceResponse =
            parse_body(r#"{"ethereum":{"usd":2512.4}}"#, PRICE_URL).unwrap();
        assert_eq!(extract_price(&body, "ethereum", "usd").unwrap(), 2512.4);
        assert!(extract_price(&body, "bitcoin", "usd").is_err());
    }
}
