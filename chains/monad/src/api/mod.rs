//! Typed clients for the third-party HTTP APIs the recipes depend on.

use anyhow::Result;
use core_logic::NetworkError;
use ethers::types::{Bytes, U256};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod blink;
pub mod gas_zip;
pub mod monorail;
pub mod price;

pub use blink::{BlinkClient, BlinkTransaction};
pub use gas_zip::GasZipClient;
pub use monorail::{MonorailClient, MonorailQuote};
pub use price::PriceClient;

/// Maps non-2xx to `HttpError` and undecodable bodies to `InvalidResponse`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::HttpError {
            status_code: status.as_u16(),
            endpoint: endpoint.to_string(),
        }
        .into());
    }
    let body = response.text().await?;
    parse_body(&body, endpoint)
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        NetworkError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn invalid(endpoint: &str, reason: impl Into<String>) -> anyhow::Error {
    NetworkError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Accepts `"0x1a"`, `"26"` or `26`.
pub(crate) fn parse_quantity(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex_digits) if hex_digits.is_empty() => Some(U256::zero()),
                Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok(),
                None => U256::from_dec_str(s).ok(),
            }
        }
        _ => None,
    }
}

pub(crate) fn parse_bytes(raw: &str) -> Option<Bytes> {
    hex::decode(raw.trim().trim_start_matches("0x"))
        .ok()
        .map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity_forms() {
        assert_eq!(parse_quantity(&json!("0x1a")), Some(U256::from(26u64)));
        assert_eq!(parse_quantity(&json!("26")), Some(U256::from(26u64)));
        assert_eq!(parse_quantity(&json!(26)), Some(U256::from(26u64)));
        assert_eq!(parse_quantity(&json!("0x")), Some(U256::zero()));
        assert_eq!(parse_quantity(&json!(null)), None);
        assert_eq!(parse_quantity(&json!("zz")), None);
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("0xd0e30db0").unwrap().to_vec(), vec![0xd0, 0xe3, 0x0d, 0xb0]);
        assert!(parse_bytes("0xzz").is_none());
    }

    #[test]
    fn test_parse_body_maps_to_invalid_response() {
        let err = parse_body::<Value>("not json", "https://api.example").unwrap_err();
        let net = err.downcast_ref::<NetworkError>().unwrap();
        assert!(matches!(net, NetworkError::InvalidResponse { .. }));
    }
}
