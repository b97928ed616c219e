//! Auto and manual route planning over the stored wallets.

use crate::task::TaskKind;
use core_logic::{ConfigError, WalletRecord};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoProxy,
    LowBalance(f64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoProxy => write!(f, "no proxy assigned"),
            SkipReason::LowBalance(b) => write!(f, "balance {:.4} MON below minimum", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedWallet {
    pub address: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct AutoPlan {
    /// One group per task, in order of first appearance.
    pub groups: Vec<(TaskKind, Vec<WalletRecord>)>,
    pub skipped: Vec<SkippedWallet>,
}

impl AutoPlan {
    pub fn job_count(&self) -> usize {
        self.groups.iter().map(|(_, w)| w.len()).sum()
    }
}

/// A wallet runs only with a proxy and at least `min_balance` MON.
pub fn check_eligible(wallet: &WalletRecord, min_balance: f64) -> Result<(), SkipReason> {
    if !wallet.has_proxy() {
        return Err(SkipReason::NoProxy);
    }
    let balance = wallet.balance_or_zero();
    if balance < min_balance {
        return Err(SkipReason::LowBalance(balance));
    }
    Ok(())
}

fn partition(
    wallets: &[WalletRecord],
    min_balance: f64,
) -> (Vec<&WalletRecord>, Vec<SkippedWallet>) {
    let mut eligible = Vec::new();
    let mut skipped = Vec::new();
    for wallet in wallets {
        match check_eligible(wallet, min_balance) {
            Ok(()) => eligible.push(wallet),
            Err(reason) => skipped.push(SkippedWallet {
                address: wallet.address.clone(),
                reason,
            }),
        }
    }
    (eligible, skipped)
}

/// Every eligible wallet is queued for every task, stalest task first.
pub fn plan_auto(wallets: &[WalletRecord], min_balance: f64) -> AutoPlan {
    let keys = TaskKind::keys();
    let (eligible, skipped) = partition(wallets, min_balance);
    let mut groups: Vec<(TaskKind, Vec<WalletRecord>)> = Vec::new();

    for wallet in eligible {
        for key in wallet.tasks_by_staleness(&keys) {
            let Some(kind) = TaskKind::from_key(key) else {
                continue;
            };
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, members)) => members.push(wallet.clone()),
                None => groups.push((kind, vec![wallet.clone()])),
            }
        }
    }

    AutoPlan { groups, skipped }
}

/// Parses a digit string such as `"15234"`. Digits with no task (`0`) are
/// ignored; any other character is an error.
pub fn parse_manual_route(input: &str) -> Result<Vec<TaskKind>, ConfigError> {
    let trimmed = input.trim();
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: "route".to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("route is empty".to_string()));
    }

    let mut kinds = Vec::new();
    for c in trimmed.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| invalid(format!("'{}' is not a digit", c)))?;
        if let Some(kind) = TaskKind::from_digit(digit as u8) {
            kinds.push(kind);
        }
    }

    if kinds.is_empty() {
        return Err(invalid("route names no tasks".to_string()));
    }
    Ok(kinds)
}

/// Flat job list: each route step applied to every eligible wallet.
pub fn plan_manual(
    kinds: &[TaskKind],
    wallets: &[WalletRecord],
    min_balance: f64,
) -> (Vec<(TaskKind, WalletRecord)>, Vec<SkippedWallet>) {
    let (eligible, skipped) = partition(wallets, min_balance);
    let jobs = kinds
        .iter()
        .flat_map(|kind| eligible.iter().map(move |w| (*kind, (*w).clone())))
        .collect();
    (jobs, skipped)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    Quit,
    Run(usize),
    Invalid(String),
}

/// Interprets the batch-size prompt. Sizes larger than what is left are
/// clamped.
pub fn next_batch(remaining: usize, input: &str) -> BatchInput {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return BatchInput::Quit;
    }
    match input.parse::<usize>() {
        Ok(0) => BatchInput::Invalid("batch size must be at least 1".to_string()),
        Ok(n) => BatchInput::Run(n.min(remaining)),
        Err(_) => BatchInput::Invalid(format!("'{}' is not a number or 'q'", input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn wallet(address: &str, proxy: bool, balance: f64, ran: &[(&str, u32)]) -> WalletRecord {
        let mut last_runs: BTreeMap<String, Option<chrono::NaiveDateTime>> =
            TaskKind::keys().into_iter().map(|k| (k.to_string(), None)).collect();
        for (key, hour) in ran {
            let at = NaiveDate::from_ymd_opt(2025, 2, 1)
                .unwrap()
                .and_hms_opt(*hour, 0, 0)
                .unwrap();
            last_runs.insert(key.to_string(), Some(at));
        }
        WalletRecord {
            address: address.to_string(),
            private_key: "k".to_string(),
            proxy: proxy.then(|| "1.2.3.4:80".to_string()),
            balance: Some(balance),
            last_runs,
        }
    }

    #[test]
    fn test_plan_auto_skips_ineligible() {
        let wallets = vec![
            wallet("0xA", true, 1.0, &[]),
            wallet("0xB", false, 1.0, &[]),
            wallet("0xC", true, 0.05, &[]),
        ];
        let plan = plan_auto(&wallets, 0.1);

        assert_eq!(plan.groups.len(), 9);
        assert_eq!(plan.job_count(), 9);
        assert_eq!(plan.skipped.len(), 2);
        assert_eq!(plan.skipped[0].reason, SkipReason::NoProxy);
        assert_eq!(plan.skipped[1].reason, SkipReason::LowBalance(0.05));
    }

    #[test]
    fn test_plan_auto_orders_by_staleness() {
        // bean ran most recently, kinza earlier, everything else never
        let wallets = vec![wallet("0xA", true, 1.0, &[("bean", 10), ("kinza", 5)])];
        let plan = plan_auto(&wallets, 0.1);
        let order: Vec<TaskKind> = plan.groups.iter().map(|(k, _)| *k).collect();

        assert_eq!(order[0], TaskKind::Magma);
        assert_eq!(order[7], TaskKind::Kinza);
        assert_eq!(order[8], TaskKind::Bean);
    }

    #[test]
    fn test_plan_auto_group_order_is_first_insertion() {
        let wallets = vec![
            wallet("0xA", true, 1.0, &[("bean", 1)]),
            wallet("0xB", true, 1.0, &[]),
        ];
        let plan = plan_auto(&wallets, 0.1);

        // 0xA put kinza first, so kinza leads even though 0xB wants bean first
        assert_eq!(plan.groups[0].0, TaskKind::Kinza);
        assert_eq!(plan.groups.last().unwrap().0, TaskKind::Bean);
        let bean = &plan.groups.last().unwrap().1;
        assert_eq!(bean[0].address, "0xA");
        assert_eq!(bean[1].address, "0xB");
    }

    #[test]
    fn test_parse_manual_route() {
        let kinds = parse_manual_route(" 1503 ").unwrap();
        assert_eq!(kinds, vec![TaskKind::Bean, TaskKind::Dak, TaskKind::Magma]);
        assert!(parse_manual_route("12a").is_err());
        assert!(parse_manual_route("").is_err());
        assert!(parse_manual_route("00").is_err());
    }

    #[test]
    fn test_plan_manual_route_major_order() {
        let wallets = vec![
            wallet("0xA", true, 1.0, &[]),
            wallet("0xB", true, 0.0, &[]),
            wallet("0xC", true, 1.0, &[]),
        ];
        let (jobs, skipped) = plan_manual(&[TaskKind::Nft, TaskKind::Bean], &wallets, 0.1);
        let flat: Vec<(TaskKind, &str)> =
            jobs.iter().map(|(k, w)| (*k, w.address.as_str())).collect();

        assert_eq!(
            flat,
            vec![
                (TaskKind::Nft, "0xA"),
                (TaskKind::Nft, "0xC"),
                (TaskKind::Bean, "0xA"),
                (TaskKind::Bean, "0xC"),
            ]
        );
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_next_batch() {
        assert_eq!(next_batch(10, "q"), BatchInput::Quit);
        assert_eq!(next_batch(10, " Q\n"), BatchInput::Quit);
        assert_eq!(next_batch(10, "4"), BatchInput::Run(4));
        assert_eq!(next_batch(3, "50"), BatchInput::Run(3));
        assert!(matches!(next_batch(10, "0"), BatchInput::Invalid(_)));
        assert!(matches!(next_batch(10, "five"), BatchInput::Invalid(_)));
    }
}
