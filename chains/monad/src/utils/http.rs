use anyhow::Result;
use core_logic::ProxyConfig;
use ethers::prelude::*;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("monad-project/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the RPC provider and API clients of one wallet.
pub fn build_client(proxy: Option<&ProxyConfig>, timeout_secs: u64) -> Result<Client> {
    let mut client_builder = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT);
    if let Some(proxy_conf) = proxy {
        let mut proxy = reqwest::Proxy::all(&proxy_conf.url)?;
        if let (Some(u), Some(p)) = (&proxy_conf.username, &proxy_conf.password) {
            proxy = proxy.basic_auth(u, p);
        }
        client_builder = client_builder.proxy(proxy);
    }
    Ok(client_builder.build()?)
}

pub fn build_provider(rpc_url: &str, client: Client) -> Result<Provider<Http>> {
    Ok(Provider::new(Http::new_with_client(
        reqwest::Url::parse(rpc_url)?,
        client,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_authenticated_proxy() {
        let proxy = ProxyConfig::parse("1.2.3.4:8080:user:pass").unwrap();
        assert!(build_client(Some(&proxy), 15).is_ok());
        assert!(build_client(None, 15).is_ok());
    }

    #[test]
    fn test_build_provider_rejects_bad_url() {
        let client = build_client(None, 15).unwrap();
        assert!(build_provider("not a url", client).is_err());
    }
}
