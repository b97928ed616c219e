use serde::{Deserialize, Serialize};
use std::fmt;

/// Where wallets are imported from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletSource {
    /// Plain text file, one private key per line
    KeyFile { path: String },
    /// `|`-delimited CSV with an `address|private_key` header
    Csv { path: String },
    /// `[[wallets]]` entries embedded in the config file
    Inline(Vec<WalletEntry>),
}

/// A wallet declared directly in the config file.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    #[serde(alias = "key")]
    pub private_key: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl fmt::Debug for WalletEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletEntry")
            .field("private_key", &"***REDACTED***")
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Base URL without credentials, e.g. `http://1.2.3.4:8080`
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// `host:port` part, used for logging without leaking credentials.
    pub fn host(&self) -> &str {
        self.url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url)
    }
}
