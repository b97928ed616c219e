use crate::config::MonadConfig;
use crate::utils::gas::GasManager;
use crate::utils::tx::{send_legacy, TxOutcome};
use anyhow::Result;
use ethers::prelude::*;
use std::fmt;
use std::sync::Arc;

pub mod buy_monad;
pub mod t01_bean;
pub mod t02_kinza;
pub mod t03_magma;
pub mod t04_main_site;
pub mod t05_monorail;
pub mod t06_nft;
pub mod t07_pandaria;

pub use self::buy_monad::BuyMonadTask;
pub use self::t01_bean::BeanTask;
pub use self::t02_kinza::KinzaTask;
pub use self::t03_magma::MagmaTask;
pub use self::t04_main_site::MainSiteSwapTask;
pub use self::t05_monorail::MonorailTask;
pub use self::t06_nft::LilChogstarsTask;
pub use self::t07_pandaria::PandariaTask;

pub use core_logic::traits::{Task, TaskResult};

/// The nine recipes a route can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    Bean,
    Kinza,
    Magma,
    Chog,
    Dak,
    Yaki,
    Monorail,
    Nft,
    Pandaria,
}

impl TaskKind {
    /// Menu order; position + 1 is the route digit.
    pub const ALL: [TaskKind; 9] = [
        TaskKind::Bean,
        TaskKind::Kinza,
        TaskKind::Magma,
        TaskKind::Chog,
        TaskKind::Dak,
        TaskKind::Yaki,
        TaskKind::Monorail,
        TaskKind::Nft,
        TaskKind::Pandaria,
    ];

    /// Column suffix in the wallet store (`last_run_<key>`).
    pub fn key(&self) -> &'static str {
        match self {
            TaskKind::Bean => "bean",
            TaskKind::Kinza => "kinza",
            TaskKind::Magma => "magma",
            TaskKind::Chog => "chog",
            TaskKind::Dak => "dak",
            TaskKind::Yaki => "yaki",
            TaskKind::Monorail => "monorail",
            TaskKind::Nft => "nft",
            TaskKind::Pandaria => "pandaria",
        }
    }

    pub fn digit(&self) -> u8 {
        match self {
            TaskKind::Bean => 1,
            TaskKind::Kinza => 2,
            TaskKind::Magma => 3,
            TaskKind::Chog => 4,
            TaskKind::Dak => 5,
            TaskKind::Yaki => 6,
            TaskKind::Monorail => 7,
            TaskKind::Nft => 8,
            TaskKind::Pandaria => 9,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Bean => "Bean swap + liquidity",
            TaskKind::Kinza => "Kinza DAK supply/withdraw",
            TaskKind::Magma => "Magma stake/unstake",
            TaskKind::Chog => "Buy CHOG (main site)",
            TaskKind::Dak => "Buy DAK (main site)",
            TaskKind::Yaki => "Buy YAKI (main site)",
            TaskKind::Monorail => "Monorail token swap",
            TaskKind::Nft => "Mint Lil Chogstars",
            TaskKind::Pandaria => "Pandaria MON wrap",
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.digit() == digit)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.key()).collect()
    }

    pub fn build(&self) -> Box<MonadTask> {
        match self {
            TaskKind::Bean => Box::new(BeanTask),
            TaskKind::Kinza => Box::new(KinzaTask),
            TaskKind::Magma => Box::new(MagmaTask),
            TaskKind::Chog => Box::new(MainSiteSwapTask::chog()),
            TaskKind::Dak => Box::new(MainSiteSwapTask::dak()),
            TaskKind::Yaki => Box::new(MainSiteSwapTask::yaki()),
            TaskKind::Monorail => Box::new(MonorailTask),
            TaskKind::Nft => Box::new(LilChogstarsTask),
            TaskKind::Pandaria => Box::new(PandariaTask),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Debug)]
pub struct TaskContext {
    pub provider: Provider<Http>,
    pub wallet: LocalWallet,
    pub config: Arc<MonadConfig>,
    /// Proxied client for third-party APIs
    pub http: reqwest::Client,
    pub gas_manager: Arc<GasManager>,
}

impl TaskContext {
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub async fn send(&self, tx: TransactionRequest) -> Result<TxOutcome> {
        send_legacy(&self.provider, &self.wallet, tx, self.config.wait_for_receipt).await
    }

    /// Unix deadline `secs` from now.
    pub fn deadline(secs: u64) -> Result<U256> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();
        Ok(U256::from(now + secs))
    }
}

pub type MonadTask = dyn Task<TaskContext> + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_map() {
        let expected = [
            (1, "bean"),
            (2, "kinza"),
            (3, "magma"),
            (4, "chog"),
            (5, "dak"),
            (6, "yaki"),
            (7, "monorail"),
            (8, "nft"),
            (9, "pandaria"),
        ];
        for (digit, key) in expected {
            let kind = TaskKind::from_digit(digit).unwrap();
            assert_eq!(kind.key(), key);
            assert_eq!(TaskKind::from_key(key), Some(kind));
        }
        assert_eq!(TaskKind::from_digit(0), None);
    }

    #[test]
    fn test_build_names_match_keys() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.build().name(), kind.key());
        }
    }
}
