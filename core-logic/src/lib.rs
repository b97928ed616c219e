//! # Core Logic - Shared Wallet-Fleet Plumbing
//!
//! Chain-agnostic pieces used by the chain crates: the SQLite wallet store,
//! wallet and proxy import, the bounded worker runner, logging and metrics.
//!
//! ## Modules
//!
//! - [`config`] - Wallet sources and proxy descriptors
//! - [`database`] - Async SQLite wallet store with per-task last-run columns
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Task and RPC counters with JSON export
//! - [`traits`] - Task and wallet loader traits
//! - [`utils`] - Logger, gas pricing, wallet/proxy import, worker runner

pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod utils;

pub use config::{ProxyConfig, WalletEntry, WalletSource};
pub use database::{DatabaseManager, DbMetrics, DbMetricsSnapshot, TaskRun, WalletRecord};
pub use error::{ConfigError, CoreError, DatabaseError, NetworkError, WalletError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use traits::{Task, TaskResult, WalletLoader};

pub use utils::{
    format_task_line, gwei_to_wei, normalize_key, setup_logger, BatchStats, GasConfig,
    GasConfigToml, ProxyManager, WalletImport, WalletManager, WorkerRunner, TASK_RESULT_TARGET,
};
