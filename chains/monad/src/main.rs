use monad_project::app::App;
use monad_project::config::MonadConfig;
use monad_project::menu;
use monad_project::route::parse_manual_route;

use anyhow::Result;
use clap::{Parser, Subcommand};
use core_logic::metrics::MetricsCollector;
use core_logic::setup_logger;
use dotenv::dotenv;
use tokio::time::{interval, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/monad/config.toml")]
    config: String,
    #[arg(short, long)]
    export_metrics: Option<String>,
    #[arg(long, default_value = "30")]
    metrics_interval: u64,
    /// Debug logging on the terminal
    #[arg(short, long)]
    verbose: bool,
    /// Without a command the interactive menu starts
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import wallets from the private key file or the config list
    Import {
        #[arg(long, default_value = "key-file")]
        source: ImportSource,
    },
    /// Generate new wallets, write them to the CSV file and import them
    Generate {
        #[arg(default_value = "10")]
        count: usize,
    },
    /// Give proxy-less wallets a free proxy from the proxy file
    AssignProxies,
    /// Run every task for every eligible wallet, stalest first
    Auto {
        #[arg(short, long)]
        delay: Option<f64>,
    },
    /// Run a digit route such as 1539
    Manual {
        route: String,
        #[arg(short, long)]
        delay: Option<f64>,
        /// Fixed batch size; asks before each batch when omitted
        #[arg(short, long)]
        batch: Option<usize>,
    },
    /// Delete every stored wallet
    Clear {
        #[arg(long)]
        yes: bool,
    },
    List,
    /// Bridge Arbitrum ETH into MON through gas.zip
    BuyMon {
        #[arg(long, default_value = "2.0")]
        usd: f64,
        #[arg(short, long)]
        delay: Option<f64>,
    },
    /// Print native and token balances of every wallet
    Balances,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ImportSource {
    KeyFile,
    Config,
    Csv,
}

fn delay_or_default(delay: Option<f64>, config: &MonadConfig) -> Result<Duration> {
    let secs = delay.unwrap_or(config.default_delay_secs);
    menu::parse_delay(&secs.to_string()).map_err(anyhow::Error::msg)
}

async fn run_command(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Import { source } => {
            let summary = match source {
                ImportSource::KeyFile => app.import_from_key_file().await?,
                ImportSource::Config => app.import_from_config().await?,
                ImportSource::Csv => {
                    app.import_from(core_logic::WalletSource::Csv {
                        path: app.config().csv_file.clone(),
                    })
                    .await?
                }
            };
            info!(
                "{} added, {} already stored, {} invalid",
                summary.added, summary.skipped, summary.invalid
            );
        }
        Command::Generate { count } => {
            let summary = app.generate_wallets(count).await?;
            info!("{} wallets generated", summary.added);
        }
        Command::AssignProxies => {
            let n = app.assign_proxies().await?;
            info!("{} wallets received a proxy", n);
        }
        Command::Auto { delay } => {
            let delay = delay_or_default(delay, app.config())?;
            let stats = app.run_auto(delay).await?;
            info!(
                "Auto route finished: {} ok, {} failed, {} cancelled",
                stats.success, stats.failed, stats.cancelled
            );
        }
        Command::Manual {
            route,
            delay,
            batch,
        } => {
            let kinds = parse_manual_route(&route)?;
            let delay = delay_or_default(delay, app.config())?;
            let jobs = app.manual_jobs(&kinds).await?;
            let stats = menu::run_manual_batches(app, jobs, delay, batch).await?;
            info!(
                "Manual route finished: {} ok, {} failed, {} cancelled",
                stats.success, stats.failed, stats.cancelled
            );
        }
        Command::Clear { yes } => {
            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt("Delete every wallet from the database?")
                    .default(false)
                    .interact()?;
            if confirmed {
                app.clear_wallets().await?;
            }
        }
        Command::List => menu::print_wallets(&app.list_wallets().await?),
        Command::BuyMon { usd, delay } => {
            let delay = delay_or_default(delay, app.config())?;
            let stats = app.buy_mon_for_all(usd, delay).await?;
            info!(
                "Buy MON finished: {} ok, {} failed, {} cancelled",
                stats.success, stats.failed, stats.cancelled
            );
        }
        Command::Balances => app.print_token_balances().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Keep guard alive for file logging
    let _log_guard = setup_logger("logs", "monad", args.verbose);

    info!("Loading config from: {}", args.config);
    let config = match MonadConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };
    info!("Configuration loaded for chain ID: {}", config.chain_id);

    let app = App::new(config).await?;

    let metrics_task = args.export_metrics.clone().map(|path| {
        let interval_secs = args.metrics_interval;
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = MetricsCollector::global().export_to_file(&path).await {
                    error!("Metrics export failed: {}", e);
                }
            }
        })
    });

    let result = match args.command {
        Some(command) => run_command(&app, command).await,
        None => menu::run_menu(&app).await,
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }

    if let Some(task) = metrics_task {
        task.abort();
    }
    if let Some(metrics_path) = args.export_metrics {
        match MetricsCollector::global().export_to_file(&metrics_path).await {
            Ok(_) => info!("Final metrics exported to {}", metrics_path),
            Err(e) => error!("Failed to export final metrics: {}", e),
        }
    }

    app.shutdown().await;
    result
}
