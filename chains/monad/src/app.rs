//! Operations behind the main menu and the CLI subcommands.

use crate::config::MonadConfig;
use crate::route::{plan_auto, plan_manual, SkippedWallet};
use crate::task::{BuyMonadTask, MonadTask, TaskContext, TaskKind, TaskResult};
use crate::utils::balance::{native_balance, token_report};
use crate::utils::display::{clip_message, colorize_message};
use crate::utils::gas::GasManager;
use crate::utils::http::{build_client, build_provider};
use anyhow::{Context, Result};
use colored::*;
use core_logic::metrics::MetricsCollector;
use core_logic::{
    format_task_line, BatchStats, DatabaseManager, ProxyConfig, ProxyManager, WalletError,
    WalletImport, WalletLoader, WalletManager, WalletRecord, WalletSource, WorkerRunner,
    TASK_RESULT_TARGET,
};
use ethers::prelude::*;
use ethers::utils::to_checksum;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
    pub invalid: usize,
}

/// Display ids for result lines: wallet position in the store and proxy
/// position in the proxy file, both 1-based.
#[derive(Debug, Default)]
struct Labels {
    wallets: HashMap<String, usize>,
    proxies: HashMap<String, usize>,
}

impl Labels {
    fn wallet(&self, address: &str) -> usize {
        self.wallets.get(address).copied().unwrap_or(0)
    }

    fn proxy(&self, proxy: Option<&str>) -> Option<usize> {
        proxy.and_then(|p| self.proxies.get(p).copied())
    }
}

/// State shared by every job of a batch.
struct JobRunner {
    config: Arc<MonadConfig>,
    db: Arc<DatabaseManager>,
    labels: Labels,
}

impl JobRunner {
    /// Runs one recipe for one wallet. Failures are logged and recorded,
    /// then reported as an unsuccessful result.
    async fn execute(
        &self,
        task: Box<MonadTask>,
        stamp_key: Option<&'static str>,
        wallet: WalletRecord,
    ) -> Result<TaskResult> {
        let name = task.name().to_string();
        let wallet_idx = self.labels.wallet(&wallet.address);
        let proxy_idx = self.labels.proxy(wallet.proxy.as_deref());
        let start_time = Instant::now();

        let outcome = match build_context(&self.config, &wallet) {
            Ok(ctx) => {
                let provider = ctx.provider.clone();
                let address = ctx.address();
                let result = task.run(ctx).await;
                let balance = native_balance(&provider, address).await.ok();
                result.map(|r| (r, balance))
            }
            Err(e) => Err(e),
        };
        let duration = start_time.elapsed();

        let (result, balance) = match outcome {
            Ok(pair) => pair,
            Err(e) => (
                TaskResult {
                    success: false,
                    message: format!("{:#}", e),
                    tx_hash: None,
                },
                None,
            ),
        };

        let line = format_task_line(
            wallet_idx,
            proxy_idx,
            result.success,
            &name,
            &colorize_message(&clip_message(&result.message)),
            balance,
            duration,
        );
        if result.success {
            info!(target: TASK_RESULT_TARGET, "{}", line);
        } else {
            warn!(target: TASK_RESULT_TARGET, "{}", line);
        }

        MetricsCollector::global().record_task(&name, duration, result.success);

        if result.success {
            self.record_success(stamp_key, &wallet.address, balance).await;
        }

        let message = match &result.tx_hash {
            Some(hash) => format!("{} ({})", result.message, hash),
            None => result.message.clone(),
        };
        if let Err(e) = self
            .db
            .log_task_result(
                &wallet.address,
                &name,
                result.success,
                &message,
                duration.as_millis() as u64,
            )
            .await
        {
            error!("Failed to record task history: {:#}", e);
        }

        Ok(result)
    }

    /// Stamps the task and stores the fresh balance. Returns false when
    /// either write failed; failures are logged, never raised.
    async fn record_success(
        &self,
        stamp_key: Option<&str>,
        address: &str,
        balance: Option<f64>,
    ) -> bool {
        let mut stored = true;
        if let Some(key) = stamp_key {
            if let Err(e) = self.db.update_last_run(key, address).await {
                error!("Failed to stamp {} for {}: {:#}", key, address, e);
                stored = false;
            }
        }
        if let Some(b) = balance {
            if let Err(e) = self.db.update_balance(address, b).await {
                error!("Failed to store balance for {}: {:#}", address, e);
                stored = false;
            }
        }
        stored
    }
}

fn proxy_for(wallet: &WalletRecord) -> Result<Option<ProxyConfig>> {
    wallet
        .proxy
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(ProxyConfig::parse)
        .transpose()
        .map_err(Into::into)
}

fn parse_wallet(private_key: &str, chain_id: u64) -> Result<LocalWallet> {
    Ok(private_key
        .parse::<LocalWallet>()
        .map_err(|_| WalletError::InvalidKeyFormat)?
        .with_chain_id(chain_id))
}

pub fn build_context(config: &Arc<MonadConfig>, wallet: &WalletRecord) -> Result<TaskContext> {
    let proxy = proxy_for(wallet)?;
    let http = build_client(proxy.as_ref(), config.http_timeout_secs)?;
    let provider = build_provider(&config.rpc_url, http.clone())?;
    let gas_manager =
        GasManager::new(Arc::new(provider.clone())).with_config(config.gas_config());

    Ok(TaskContext {
        provider,
        wallet: parse_wallet(&wallet.private_key, config.chain_id)?,
        config: Arc::clone(config),
        http,
        gas_manager: Arc::new(gas_manager),
    })
}

pub struct App {
    config: Arc<MonadConfig>,
    db: Arc<DatabaseManager>,
}

impl App {
    pub async fn new(config: MonadConfig) -> Result<Self> {
        let db = DatabaseManager::new(&config.db_path, &TaskKind::keys()).await?;
        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
        })
    }

    pub fn config(&self) -> &MonadConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    pub async fn shutdown(&self) {
        let m = self.db.get_metrics();
        info!(
            "DB: {} queries ({} inserts, {} selects, {} updates), avg {}ms, error rate {:.2}%",
            m.total_queries,
            m.total_inserts,
            m.total_selects,
            m.total_updates,
            m.avg_query_time_ms,
            m.error_rate()
        );
        self.db.close().await;
    }

    /// Proxy lines from the proxy file not yet held by a stored wallet,
    /// in file order.
    async fn free_proxies(&self) -> Result<VecDeque<String>> {
        let used: HashSet<String> = self
            .db
            .get_all_wallets()
            .await?
            .into_iter()
            .filter_map(|w| w.proxy)
            .collect();
        Ok(ProxyManager::load_lines(&self.config.proxy_file)?
            .into_iter()
            .filter(|p| !used.contains(p))
            .collect())
    }

    /// Stores new wallets. Existing addresses are skipped; wallets without
    /// a proxy take the next free one from the proxy file.
    pub async fn import_wallets(&self, imports: Vec<WalletImport>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut free = self.free_proxies().await?;

        for import in imports {
            let signer = match parse_wallet(&import.private_key, self.config.chain_id) {
                Ok(w) => w,
                Err(e) => {
                    warn!("Skipping wallet: {:#}", e);
                    summary.invalid += 1;
                    continue;
                }
            };
            let address = to_checksum(&signer.address(), None);

            if let Some(expected) = import.address.as_deref() {
                if !expected.eq_ignore_ascii_case(&address) {
                    warn!(
                        "{}",
                        WalletError::AddressMismatch {
                            expected: expected.to_string(),
                            actual: address.clone(),
                        }
                    );
                    summary.invalid += 1;
                    continue;
                }
            }

            let (proxy, from_pool) = match import.proxy.clone() {
                Some(p) => (Some(p), false),
                None => (free.pop_front(), true),
            };

            if self
                .db
                .insert_wallet(&address, &import.private_key, proxy.as_deref())
                .await?
            {
                if let (Some(p), true) = (&proxy, from_pool) {
                    info!("Proxy {} issued to {}", p, address);
                }
                summary.added += 1;
            } else {
                if let (Some(p), true) = (proxy, from_pool) {
                    free.push_front(p);
                }
                summary.skipped += 1;
            }
        }

        info!(
            "Import finished: {} added, {} already stored, {} invalid",
            summary.added, summary.skipped, summary.invalid
        );
        Ok(summary)
    }

    pub async fn import_from(&self, source: WalletSource) -> Result<ImportSummary> {
        let imports = WalletManager::new(source).load_wallets().await?;
        self.import_wallets(imports).await
    }

    pub async fn import_from_key_file(&self) -> Result<ImportSummary> {
        self.import_from(WalletSource::KeyFile {
            path: self.config.private_key_file.clone(),
        })
        .await
    }

    pub async fn import_from_config(&self) -> Result<ImportSummary> {
        if self.config.wallets.is_empty() {
            warn!("No [[wallets]] entries in the config file");
            return Ok(ImportSummary::default());
        }
        self.import_from(WalletSource::Inline(self.config.wallets.clone()))
            .await
    }

    /// Creates `count` fresh keys, writes them to the CSV file and imports
    /// them.
    pub async fn generate_wallets(&self, count: usize) -> Result<ImportSummary> {
        let rows: Vec<(String, String)> = {
            let mut rng = rand::thread_rng();
            (0..count)
                .map(|_| {
                    let wallet = LocalWallet::new(&mut rng);
                    (
                        to_checksum(&wallet.address(), None),
                        hex::encode(wallet.signer().to_bytes()),
                    )
                })
                .collect()
        };
        WalletManager::write_csv(&self.config.csv_file, &rows)?;
        self.import_from(WalletSource::Csv {
            path: self.config.csv_file.clone(),
        })
        .await
    }

    /// Gives every proxy-less wallet the next free proxy. Existing proxies
    /// are never replaced. Returns the number of wallets updated.
    pub async fn assign_proxies(&self) -> Result<usize> {
        let lacking: Vec<String> = self
            .db
            .get_all_wallets()
            .await?
            .into_iter()
            .filter(|w| !w.has_proxy())
            .map(|w| w.address)
            .collect();
        if lacking.is_empty() {
            info!("All wallets already have a proxy");
            return Ok(0);
        }

        let free: Vec<String> = self.free_proxies().await?.into();
        if free.is_empty() {
            warn!("No free proxies in {}", self.config.proxy_file);
            return Ok(0);
        }

        let mut assigned = 0;
        for (address, proxy) in ProxyManager::assign_round(&lacking, &free) {
            if self.db.set_proxy_if_empty(&address, &proxy).await? {
                info!("Proxy {} assigned to {}", proxy, address);
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    pub async fn clear_wallets(&self) -> Result<u64> {
        self.db.clear_wallets().await
    }

    pub async fn list_wallets(&self) -> Result<Vec<WalletRecord>> {
        self.db.get_all_wallets().await
    }

    /// Fetches and stores the native balance of every wallet, in order.
    /// A failed lookup stores 0.0.
    pub async fn refresh_balances(&self, wallets: Vec<WalletRecord>) -> Vec<WalletRecord> {
        let config = Arc::clone(&self.config);
        let db = Arc::clone(&self.db);

        stream::iter(wallets)
            .map(|mut wallet| {
                let config = Arc::clone(&config);
                let db = Arc::clone(&db);
                async move {
                    let start = Instant::now();
                    let balance = match fetch_balance(&config, &wallet).await {
                        Ok(b) => {
                            MetricsCollector::global().record_rpc_latency(start.elapsed());
                            b
                        }
                        Err(e) => {
                            warn!("Balance lookup failed for {}: {:#}", wallet.address, e);
                            0.0
                        }
                    };
                    if let Err(e) = db.update_balance(&wallet.address, balance).await {
                        error!("Failed to store balance of {}: {:#}", wallet.address, e);
                    }
                    wallet.balance = Some(balance);
                    wallet
                }
            })
            .buffered(self.config.max_workers.max(1))
            .collect()
            .await
    }

    fn labels(&self, wallets: &[WalletRecord]) -> Labels {
        let proxies = ProxyManager::load_lines(&self.config.proxy_file).unwrap_or_default();
        Labels {
            wallets: wallets
                .iter()
                .enumerate()
                .map(|(i, w)| (w.address.clone(), i + 1))
                .collect(),
            proxies: proxies
                .into_iter()
                .enumerate()
                .map(|(i, p)| (p, i + 1))
                .collect(),
        }
    }

    fn job_runner(&self, wallets: &[WalletRecord]) -> Arc<JobRunner> {
        Arc::new(JobRunner {
            config: Arc::clone(&self.config),
            db: Arc::clone(&self.db),
            labels: self.labels(wallets),
        })
    }

    fn report_skipped(skipped: &[SkippedWallet]) {
        for s in skipped {
            warn!("SKIPPED {}: {}", s.address, s.reason);
        }
    }

    /// Refreshes balances, then runs every task for every eligible wallet,
    /// task group by task group.
    pub async fn run_auto(&self, delay: Duration) -> Result<BatchStats> {
        let wallets = self.db.get_all_wallets().await?;
        if wallets.is_empty() {
            warn!("No wallets in the database");
            return Ok(BatchStats::default());
        }
        info!("Refreshing balances of {} wallets", wallets.len());
        let wallets = self.refresh_balances(wallets).await;

        let plan = plan_auto(&wallets, self.config.min_balance);
        Self::report_skipped(&plan.skipped);
        if plan.groups.is_empty() {
            warn!("No tasks for the auto route");
            return Ok(BatchStats::default());
        }
        info!("Auto route: {} jobs", plan.job_count());

        let runner = self.job_runner(&wallets);
        let mut total = BatchStats::default();
        for (kind, members) in plan.groups {
            info!("Running {} for {} wallets", kind.label(), members.len());
            let stats = run_group(&runner, kind, members, self.config.max_workers, delay).await;
            let stop = stats.cancelled > 0;
            total.merge(stats);
            if stop {
                break;
            }
        }
        Ok(total)
    }

    /// Refreshes balances and expands a manual route into jobs.
    pub async fn manual_jobs(&self, kinds: &[TaskKind]) -> Result<Vec<(TaskKind, WalletRecord)>> {
        let wallets = self.db.get_all_wallets().await?;
        if wallets.is_empty() {
            warn!("No wallets in the database");
            return Ok(Vec::new());
        }
        let wallets = self.refresh_balances(wallets).await;
        let (jobs, skipped) = plan_manual(kinds, &wallets, self.config.min_balance);
        Self::report_skipped(&skipped);
        Ok(jobs)
    }

    pub async fn run_jobs(
        &self,
        jobs: Vec<(TaskKind, WalletRecord)>,
        delay: Duration,
    ) -> Result<BatchStats> {
        let wallets = self.db.get_all_wallets().await?;
        let runner = self.job_runner(&wallets);
        let stats = WorkerRunner::run_batch(
            jobs,
            self.config.max_workers,
            delay,
            move |_, (kind, wallet)| {
                let runner = Arc::clone(&runner);
                async move { runner.execute(kind.build(), Some(kind.key()), wallet).await }
            },
        )
        .await;
        Ok(stats)
    }

    /// Bridges `usd` worth of Arbitrum ETH into MON for every wallet.
    pub async fn buy_mon_for_all(&self, usd: f64, delay: Duration) -> Result<BatchStats> {
        let wallets = self.db.get_all_wallets().await?;
        let runner = self.job_runner(&wallets);
        let stats = WorkerRunner::run_batch(
            wallets,
            self.config.max_workers,
            delay,
            move |_, wallet| {
                let runner = Arc::clone(&runner);
                async move {
                    runner
                        .execute(Box::new(BuyMonadTask::new(usd)), None, wallet)
                        .await
                }
            },
        )
        .await;
        Ok(stats)
    }

    /// Prints native and tracked token balances of every wallet.
    pub async fn print_token_balances(&self) -> Result<()> {
        for wallet in self.db.get_all_wallets().await? {
            let ctx = match build_context(&self.config, &wallet) {
                Ok(c) => c,
                Err(e) => {
                    warn!("{}: {:#}", wallet.address, e);
                    continue;
                }
            };
            let native = native_balance(&ctx.provider, ctx.address())
                .await
                .unwrap_or_default();
            let tokens = token_report(&ctx.provider, ctx.address())
                .await
                .into_iter()
                .map(|(symbol, amount)| format!("{} {:.4}", symbol, amount))
                .collect::<Vec<_>>()
                .join(" | ");
            println!(
                "{} MON {:.4} | {}",
                wallet.address.truecolor(255, 165, 0),
                native,
                tokens
            );
        }
        Ok(())
    }
}

async fn fetch_balance(config: &MonadConfig, wallet: &WalletRecord) -> Result<f64> {
    let proxy = proxy_for(wallet)?;
    let client = build_client(proxy.as_ref(), config.http_timeout_secs)?;
    let provider = build_provider(&config.rpc_url, client)?;
    let address = parse_wallet(&wallet.private_key, config.chain_id)?.address();
    native_balance(&provider, address)
        .await
        .context("RPC balance call failed")
}

async fn run_group(
    runner: &Arc<JobRunner>,
    kind: TaskKind,
    members: Vec<WalletRecord>,
    max_workers: usize,
    delay: Duration,
) -> BatchStats {
    let runner = Arc::clone(runner);
    WorkerRunner::run_batch(members, max_workers, delay, move |_, wallet| {
        let runner = Arc::clone(&runner);
        async move { runner.execute(kind.build(), Some(kind.key()), wallet).await }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const KEY_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    fn test_config(dir: &TempDir, proxies: &str) -> MonadConfig {
        let proxy_file = dir.path().join("proxies.txt");
        std::fs::write(&proxy_file, proxies).unwrap();
        MonadConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            chain_id: 10143,
            arb_rpc_url: "http://127.0.0.1:1".to_string(),
            arb_chain_id: 42161,
            db_path: dir.path().join("monad.db").to_str().unwrap().to_string(),
            private_key_file: dir.path().join("private_key.txt").to_str().unwrap().to_string(),
            csv_file: dir.path().join("new_addresses.csv").to_str().unwrap().to_string(),
            proxy_file: proxy_file.to_str().unwrap().to_string(),
            max_workers: 2,
            min_balance: 0.1,
            default_delay_secs: 0.0,
            wait_for_receipt: true,
            http_timeout_secs: 1,
            blink_api_key: None,
            gas: Default::default(),
            wallets: Vec::new(),
        }
    }

    fn import(key: &str, address: Option<&str>, proxy: Option<&str>) -> WalletImport {
        WalletImport {
            private_key: key.to_string(),
            address: address.map(str::to_string),
            proxy: proxy.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_import_derives_address_and_issues_proxy() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "1.1.1.1:80\n2.2.2.2:80\n"))
            .await
            .unwrap();

        let summary = app
            .import_wallets(vec![import(KEY, None, None), import(KEY, None, None)])
            .await
            .unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);

        let stored = app.list_wallets().await.unwrap();
        assert_eq!(stored[0].address, KEY_ADDRESS);
        assert_eq!(stored[0].proxy.as_deref(), Some("1.1.1.1:80"));
    }

    #[tokio::test]
    async fn test_import_rejects_address_mismatch() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();

        let summary = app
            .import_wallets(vec![import(KEY, Some("0x0000000000000000000000000000000000000001"), None)])
            .await
            .unwrap();
        assert_eq!(summary.invalid, 1);
        assert_eq!(app.db().count_wallets().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generate_then_assign_proxies() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();

        let summary = app.generate_wallets(3).await.unwrap();
        assert_eq!(summary.added, 3);
        assert!(std::path::Path::new(&app.config().csv_file).exists());

        std::fs::write(&app.config().proxy_file, "9.9.9.9:80\n8.8.8.8:80\n").unwrap();
        assert_eq!(app.assign_proxies().await.unwrap(), 2);
        // pool exhausted, nothing left to hand out
        assert_eq!(app.assign_proxies().await.unwrap(), 0);

        let with_proxy = app
            .list_wallets()
            .await
            .unwrap()
            .iter()
            .filter(|w| w.has_proxy())
            .count();
        assert_eq!(with_proxy, 2);
    }

    #[tokio::test]
    async fn test_refresh_balances_falls_back_to_zero() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();
        app.import_wallets(vec![import(KEY, None, None)]).await.unwrap();

        let wallets = app.list_wallets().await.unwrap();
        let refreshed = app.refresh_balances(wallets).await;
        assert_eq!(refreshed[0].balance, Some(0.0));

        let stored = app.db().get_wallet(KEY_ADDRESS).await.unwrap().unwrap();
        assert_eq!(stored.balance, Some(0.0));
    }

    #[tokio::test]
    async fn test_failed_job_is_recorded_without_stamp() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();
        app.import_wallets(vec![import(KEY, None, Some("1.2.3.4:80"))])
            .await
            .unwrap();

        let wallet = app.db().get_wallet(KEY_ADDRESS).await.unwrap().unwrap();
        let stats = app
            .run_jobs(vec![(TaskKind::Nft, wallet)], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(stats.failed, 1);

        let wallet = app.db().get_wallet(KEY_ADDRESS).await.unwrap().unwrap();
        assert_eq!(wallet.last_run("nft"), None);
        let history = app.db().get_task_history(KEY_ADDRESS, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "FAILED");
    }

    #[tokio::test]
    async fn test_success_writes_stamp_and_balance() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();
        app.import_wallets(vec![import(KEY, None, None)]).await.unwrap();
        let runner = app.job_runner(&app.list_wallets().await.unwrap());

        assert!(runner.record_success(Some("nft"), KEY_ADDRESS, Some(1.25)).await);

        let wallet = app.db().get_wallet(KEY_ADDRESS).await.unwrap().unwrap();
        assert!(wallet.last_run("nft").is_some());
        assert_eq!(wallet.balance, Some(1.25));
    }

    #[tokio::test]
    async fn test_failed_stamp_still_stores_balance() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();
        app.import_wallets(vec![import(KEY, None, None)]).await.unwrap();
        let runner = app.job_runner(&app.list_wallets().await.unwrap());

        assert!(!runner.record_success(Some("swap"), KEY_ADDRESS, Some(0.5)).await);

        let wallet = app.db().get_wallet(KEY_ADDRESS).await.unwrap().unwrap();
        assert_eq!(wallet.balance, Some(0.5));
    }

    #[tokio::test]
    async fn test_balance_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let app = App::new(test_config(&dir, "")).await.unwrap();
        let runner = app.job_runner(&[]);
        app.db().close().await;

        assert!(!runner.record_success(None, KEY_ADDRESS, Some(2.0)).await);
        assert!(app.db().get_metrics().total_errors >= 1);
    }
}
