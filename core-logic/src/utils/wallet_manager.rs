use crate::config::{WalletEntry, WalletSource};
use crate::error::WalletError;
use crate::traits::WalletLoader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const CSV_DELIMITER: char = '|';

/// A wallet read from an import source, before it reaches the database.
#[derive(Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct WalletImport {
    /// 64 lowercase-or-mixed hex chars, no `0x` prefix
    pub private_key: String,
    pub address: Option<String>,
    pub proxy: Option<String>,
}

impl fmt::Debug for WalletImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletImport")
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .field("proxy", &self.proxy.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Trims, strips `0x` and checks the key is 64 hex chars.
pub fn normalize_key(raw: &str) -> Result<String, WalletError> {
    let trimmed = raw.trim();
    let key = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if key.len() != 64 {
        return Err(WalletError::InvalidKeyLength { length: key.len() });
    }
    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidKeyFormat);
    }
    Ok(key.to_string())
}

pub struct WalletManager {
    source: WalletSource,
}

impl WalletManager {
    pub fn new(source: WalletSource) -> Self {
        Self { source }
    }

    /// One key per line; blank lines and `#` comments are skipped.
    /// Invalid keys are reported and skipped.
    pub fn from_key_file(path: &str) -> Result<Vec<WalletImport>> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let mut imports = Vec::new();

        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match normalize_key(line) {
                Ok(private_key) => imports.push(WalletImport {
                    private_key,
                    address: None,
                    proxy: None,
                }),
                Err(e) => warn!("{} line {}: {}", path, i + 1, e),
            }
        }

        info!("Read {} keys from {}", imports.len(), path);
        Ok(imports)
    }

    /// `|`-delimited file with a header naming `address`, `private_key`
    /// (or `key`) and optionally `proxy`.
    pub fn from_csv(path: &str) -> Result<Vec<WalletImport>> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        parse_csv(&content).with_context(|| format!("Failed to parse {}", path))
    }

    pub fn from_entries(entries: &[WalletEntry]) -> Vec<WalletImport> {
        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match normalize_key(&entry.private_key) {
                Ok(private_key) => Some(WalletImport {
                    private_key,
                    address: None,
                    proxy: entry.proxy.clone().filter(|p| !p.trim().is_empty()),
                }),
                Err(e) => {
                    warn!("Config wallet #{}: {}", i + 1, e);
                    None
                }
            })
            .collect()
    }

    /// Writes `address|private_key` rows with a header, overwriting `path`.
    pub fn write_csv(path: &str, rows: &[(String, String)]) -> Result<()> {
        let mut file = fs::File::create(Path::new(path))
            .with_context(|| format!("Failed to create {}", path))?;
        writeln!(file, "address{}private_key", CSV_DELIMITER)?;
        for (address, key) in rows {
            writeln!(file, "{}{}{}", address, CSV_DELIMITER, key)?;
        }
        info!("Wrote {} wallets to {}", rows.len(), path);
        Ok(())
    }
}

#[async_trait]
impl WalletLoader for WalletManager {
    type Wallet = WalletImport;

    async fn load_wallets(&self) -> Result<Vec<WalletImport>> {
        match &self.source {
            WalletSource::KeyFile { path } => Self::from_key_file(path),
            WalletSource::Csv { path } => Self::from_csv(path),
            WalletSource::Inline(entries) => Ok(Self::from_entries(entries)),
        }
    }
}

fn parse_csv(content: &str) -> Result<Vec<WalletImport>> {
    let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(WalletError::MalformedRow {
        row: 1,
        reason: "missing header".to_string(),
    })?;
    let columns: Vec<String> = header
        .split(CSV_DELIMITER)
        .map(|c| c.trim().to_lowercase())
        .collect();
    let find = |names: &[&str]| columns.iter().position(|c| names.contains(&c.as_str()));

    let key_idx = find(&["private_key", "key"]).ok_or(WalletError::MalformedRow {
        row: 1,
        reason: "no private_key column".to_string(),
    })?;
    let address_idx = find(&["address"]);
    let proxy_idx = find(&["proxy"]);

    let mut imports = Vec::new();
    for (i, line) in lines {
        let fields: Vec<&str> = line.split(CSV_DELIMITER).map(str::trim).collect();
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };

        let Some(raw_key) = cell(Some(key_idx)) else {
            warn!("CSV row {}: no private key, skipped", i + 1);
            continue;
        };
        match normalize_key(&raw_key) {
            Ok(private_key) => imports.push(WalletImport {
                private_key,
                address: cell(address_idx),
                proxy: cell(proxy_idx),
            }),
            Err(e) => warn!("CSV row {}: {}", i + 1, e),
        }
    }
    Ok(imports)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_normalize_key_strips_prefix() {
        assert_eq!(normalize_key(&format!("  0x{}\n", KEY)).unwrap(), KEY);
        assert_eq!(normalize_key(KEY).unwrap(), KEY);
    }

    #[test]
    fn test_normalize_key_rejects_bad_input() {
        assert!(matches!(
            normalize_key("0x1234"),
            Err(WalletError::InvalidKeyLength { length: 4 })
        ));
        let bad = format!("{}zz", &KEY[..62]);
        assert!(matches!(
            normalize_key(&bad),
            Err(WalletError::InvalidKeyFormat)
        ));
    }

    #[test]
    fn test_parse_csv_with_optional_columns() {
        let content = format!(
            "address|private_key|proxy\n0xAAA|{k}|1.1.1.1:80\n|{k}|\n0xBBB||\n",
            k = KEY
        );
        let rows = parse_csv(&content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address.as_deref(), Some("0xAAA"));
        assert_eq!(rows[0].proxy.as_deref(), Some("1.1.1.1:80"));
        assert_eq!(rows[1].address, None);
        assert_eq!(rows[1].proxy, None);
    }

    #[test]
    fn test_parse_csv_accepts_key_alias() {
        let content = format!("key|address\n{}|0xCCC\n", KEY);
        let rows = parse_csv(&content).unwrap();
        assert_eq!(rows[0].address.as_deref(), Some("0xCCC"));
    }

    #[test]
    fn test_parse_csv_requires_key_column() {
        assert!(parse_csv("address|proxy\n0x1|p\n").is_err());
        assert!(parse_csv("").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let w = WalletImport {
            private_key: KEY.to_string(),
            address: None,
            proxy: None,
        };
        assert!(!format!("{:?}", w).contains(KEY));
    }
}
