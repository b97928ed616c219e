//! # Utilities Module
//!
//! Logging, gas pricing, wallet import, proxy pool and the worker runner.

pub mod gas;
pub mod logger;
pub mod proxy_manager;
pub mod runner;
pub mod wallet_manager;

pub use gas::{gwei_to_wei, GasConfig, GasConfigToml};
pub use logger::{format_task_line, setup_logger, TASK_RESULT_TARGET};
pub use proxy_manager::ProxyManager;
pub use runner::{BatchStats, WorkerRunner};
pub use wallet_manager::{normalize_key, WalletImport, WalletManager};
