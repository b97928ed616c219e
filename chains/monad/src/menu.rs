//! Interactive prompts for the main menu.

use crate::app::{App, ImportSummary};
use crate::route::{next_batch, parse_manual_route, BatchInput};
use crate::task::TaskKind;
use anyhow::Result;
use colored::*;
use core_logic::{BatchStats, WalletRecord};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::time::Duration;
use tracing::{info, warn};

const MAIN_ITEMS: [&str; 9] = [
    "1. Import wallets",
    "2. Generate new wallets",
    "3. Assign proxies",
    "4. Auto route",
    "5. Manual route",
    "6. Clear wallet database",
    "7. List wallets",
    "8. Buy MON via gas.zip",
    "0. Exit",
];

/// Accepts a non-negative number of seconds that fits in a `Duration`.
pub fn parse_delay(input: &str) -> Result<Duration, String> {
    match input.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => {
            Duration::try_from_secs_f64(v).map_err(|_| format!("delay of {}s is too long", v))
        }
        Ok(_) => Err("delay must be 0 or more seconds".to_string()),
        Err(_) => Err(format!("'{}' is not a number", input.trim())),
    }
}

pub fn prompt_delay(default_secs: f64) -> Result<Duration> {
    let raw: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Delay between tasks per worker (seconds)")
        .default(default_secs.to_string())
        .validate_with(|s: &String| parse_delay(s).map(|_| ()))
        .interact_text()?;
    parse_delay(&raw).map_err(anyhow::Error::msg)
}

fn prompt_route() -> Result<Vec<TaskKind>> {
    println!();
    for kind in TaskKind::ALL {
        println!("  {}. {}", kind.digit(), kind.label());
    }
    let raw: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Route (digits, e.g. 1539)")
        .validate_with(|s: &String| parse_manual_route(s).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    Ok(parse_manual_route(&raw)?)
}

fn print_summary(summary: ImportSummary) {
    println!(
        "{} added, {} already stored, {} invalid",
        summary.added.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.invalid.to_string().red()
    );
}

fn print_stats(stats: &BatchStats) {
    println!(
        "Done: {} succeeded, {} failed, {} cancelled",
        stats.success.to_string().green(),
        stats.failed.to_string().red(),
        stats.cancelled.to_string().yellow()
    );
}

pub fn print_wallets(wallets: &[WalletRecord]) {
    if wallets.is_empty() {
        println!("No wallets in the database");
        return;
    }
    for (i, w) in wallets.iter().enumerate() {
        let proxy = w
            .proxy
            .as_deref()
            .and_then(|p| core_logic::ProxyConfig::parse(p).ok())
            .map(|p| p.host().to_string())
            .unwrap_or_else(|| "-".to_string());
        let balance = w
            .balance
            .map(|b| format!("{:.4}", b))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "[{:03}] {} proxy: {} balance: {} MON",
            i + 1,
            w.address.truecolor(255, 165, 0),
            proxy,
            balance.yellow()
        );
        let runs: Vec<String> = w
            .last_runs
            .iter()
            .map(|(task, at)| match at {
                Some(t) => format!("{}={}", task, t.format(core_logic::database::LAST_RUN_FORMAT)),
                None => format!("{}=never", task),
            })
            .collect();
        println!("      {}", runs.join(" ").dimmed());
    }
}

/// Runs manual jobs in batches. With `fixed` set every batch has that size;
/// otherwise the user is asked before each batch.
pub async fn run_manual_batches(
    app: &App,
    mut jobs: Vec<(TaskKind, WalletRecord)>,
    delay: Duration,
    fixed: Option<usize>,
) -> Result<BatchStats> {
    let mut total = BatchStats::default();
    while !jobs.is_empty() {
        let size = match fixed {
            Some(n) => n.clamp(1, jobs.len()),
            None => {
                let raw: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!(
                        "{} tasks left. How many to run in this batch? ('q' to quit)",
                        jobs.len()
                    ))
                    .interact_text()?;
                match next_batch(jobs.len(), &raw) {
                    BatchInput::Quit => break,
                    BatchInput::Run(n) => n,
                    BatchInput::Invalid(reason) => {
                        println!("{}", reason.red());
                        continue;
                    }
                }
            }
        };

        let batch: Vec<_> = jobs.drain(..size).collect();
        let stats = app.run_jobs(batch, delay).await?;
        let stop = stats.cancelled > 0;
        total.merge(stats);
        if stop {
            warn!("Batch interrupted, {} tasks not run", jobs.len());
            break;
        }
    }
    if jobs.is_empty() {
        info!("All tasks completed");
    }
    Ok(total)
}

async fn import_menu(app: &App) -> Result<()> {
    let items = [
        "1. From private key file",
        "2. From wallet list in config",
        "3. Back",
    ];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Wallet source")
        .items(&items)
        .default(0)
        .interact()?;
    let summary = match choice {
        0 => app.import_from_key_file().await?,
        1 => app.import_from_config().await?,
        _ => return Ok(()),
    };
    print_summary(summary);
    Ok(())
}

/// Shows the main menu until the user exits.
pub async fn run_menu(app: &App) -> Result<()> {
    loop {
        println!();
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Monad testnet")
            .items(&MAIN_ITEMS)
            .default(0)
            .interact()?;

        let outcome: Result<()> = async {
            match choice {
                0 => import_menu(app).await?,
                1 => {
                    let count: usize = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt("How many wallets to create")
                        .default(10)
                        .interact_text()?;
                    print_summary(app.generate_wallets(count).await?);
                }
                2 => {
                    let n = app.assign_proxies().await?;
                    println!("{} wallets received a proxy", n);
                }
                3 => {
                    let delay = prompt_delay(app.config().default_delay_secs)?;
                    print_stats(&app.run_auto(delay).await?);
                }
                4 => {
                    let kinds = prompt_route()?;
                    let delay = prompt_delay(app.config().default_delay_secs)?;
                    let jobs = app.manual_jobs(&kinds).await?;
                    print_stats(&run_manual_batches(app, jobs, delay, None).await?);
                }
                5 => {
                    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                        .with_prompt("Delete every wallet from the database?")
                        .default(false)
                        .interact()?;
                    if confirmed {
                        let removed = app.clear_wallets().await?;
                        println!("{} wallets removed", removed);
                    }
                }
                6 => print_wallets(&app.list_wallets().await?),
                7 => {
                    let usd: f64 = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt("USD worth of ETH to bridge per wallet")
                        .default(2.0)
                        .interact_text()?;
                    let delay = prompt_delay(app.config().default_delay_secs)?;
                    print_stats(&app.buy_mon_for_all(usd, delay).await?);
                }
                _ => return Ok(()),
            }
            Ok(())
        }
        .await;

        if choice == MAIN_ITEMS.len() - 1 {
            return Ok(());
        }
        if let Err(e) = outcome {
            println!("{} {:#}", "Error:".red(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delay() {
        assert_eq!(parse_delay("0"), Ok(Duration::ZERO));
        assert_eq!(parse_delay(" 2.5 "), Ok(Duration::from_millis(2500)));
        assert!(parse_delay("-1").is_err());
        assert!(parse_delay("abc").is_err());
        assert!(parse_delay("NaN").is_err());
        assert!(parse_delay("1e300").is_err());
        assert!(parse_delay("inf").is_err());
    }
}
