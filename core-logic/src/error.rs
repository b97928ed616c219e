//! Typed errors shared by the runner crates.
//!
//! Functions that can fail for several reasons return `anyhow::Result`;
//! these enums are the leaves callers may want to match on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cannot access {path}: {msg}")]
    IoError { path: String, msg: String },

    #[error("Invalid proxy line '{line}': {reason}")]
    InvalidProxy { line: String, reason: String },
}

/// Problems with imported key material.
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Private key has wrong length: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },

    #[error("Wallet address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("CSV row {row} is malformed: {reason}")]
    MalformedRow { row: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection pool exhausted (max: {max_size})")]
    PoolExhausted { max_size: u32 },

    #[error("Cannot open database: {msg}")]
    TransactionFailed { msg: String },

    #[error("Schema update failed: {msg}")]
    MigrationFailed { msg: String },

    #[error("Unknown task column: {task}")]
    UnknownTask { task: String },
}

/// Failures talking to RPC nodes and third-party APIs.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_display() {
        let err = WalletError::InvalidKeyLength { length: 12 };
        assert_eq!(
            err.to_string(),
            "Private key has wrong length: expected 64 hex chars, got 12"
        );
    }

    #[test]
    fn test_core_error_wraps_network() {
        let err: CoreError = NetworkError::HttpError {
            status_code: 429,
            endpoint: "https://api.example".to_string(),
        }
        .into();
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_unknown_task_downcasts_from_anyhow() {
        let err: anyhow::Error = DatabaseError::UnknownTask {
            task: "swap".to_string(),
        }
        .into();
        assert!(matches!(
            err.downcast_ref::<DatabaseError>(),
            Some(DatabaseError::UnknownTask { .. })
        ));
    }
}
