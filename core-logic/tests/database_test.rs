use chrono::NaiveDate;
use core_logic::DatabaseManager;
use tempfile::TempDir;

const TASKS: [&str; 3] = ["bean", "kinza", "magma"];

async fn open_db(dir: &TempDir) -> DatabaseManager {
    let path = dir.path().join("wallets.db");
    DatabaseManager::new(path.to_str().unwrap(), &TASKS)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_insert_skips_duplicates() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;

    assert!(db.insert_wallet("0xA", "key-a", None).await.unwrap());
    assert!(!db.insert_wallet("0xA", "other-key", Some("1.1.1.1:80")).await.unwrap());
    assert!(db.insert_wallet("0xB", "key-b", Some("2.2.2.2:80")).await.unwrap());

    assert_eq!(db.count_wallets().await.unwrap(), 2);
    let a = db.get_wallet("0xA").await.unwrap().unwrap();
    assert_eq!(a.private_key, "key-a");
    assert_eq!(a.proxy, None);
}

#[tokio::test]
async fn test_wallets_keep_insertion_order() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;

    for addr in ["0xC", "0xA", "0xB"] {
        db.insert_wallet(addr, "k", None).await.unwrap();
    }
    let order: Vec<String> = db
        .get_all_wallets()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.address)
        .collect();
    assert_eq!(order, vec!["0xC", "0xA", "0xB"]);
}

#[tokio::test]
async fn test_last_run_round_trip_and_staleness() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    db.insert_wallet("0xA", "k", None).await.unwrap();

    let early = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let late = NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    db.update_last_run_at("bean", "0xA", late).await.unwrap();
    db.update_last_run_at("magma", "0xA", early).await.unwrap();

    let w = db.get_wallet("0xA").await.unwrap().unwrap();
    assert_eq!(w.last_run("bean"), Some(late));
    assert_eq!(w.last_run("kinza"), None);
    assert_eq!(w.tasks_by_staleness(&TASKS), vec!["kinza", "magma", "bean"]);
}

#[tokio::test]
async fn test_update_last_run_stamps_now() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    db.insert_wallet("0xA", "k", None).await.unwrap();

    db.update_last_run("kinza", "0xA").await.unwrap();
    let w = db.get_wallet("0xA").await.unwrap().unwrap();
    assert!(w.last_run("kinza").is_some());
}

#[tokio::test]
async fn test_unknown_task_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    db.insert_wallet("0xA", "k", None).await.unwrap();

    assert!(db.update_last_run("nft", "0xA").await.is_err());
}

#[tokio::test]
async fn test_invalid_task_key_fails_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.db");
    let result = DatabaseManager::new(path.to_str().unwrap(), &["bean", "x y"]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_reopen_adds_new_task_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grow.db");
    let path = path.to_str().unwrap();

    {
        let db = DatabaseManager::new(path, &["bean"]).await.unwrap();
        db.insert_wallet("0xA", "k", None).await.unwrap();
        db.close().await;
    }

    let db = DatabaseManager::new(path, &["bean", "pandaria"]).await.unwrap();
    db.update_last_run("pandaria", "0xA").await.unwrap();
    let w = db.get_wallet("0xA").await.unwrap().unwrap();
    assert!(w.last_run("pandaria").is_some());
    assert_eq!(w.last_run("bean"), None);
}

#[tokio::test]
async fn test_set_proxy_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    db.insert_wallet("0xA", "k", Some("1.1.1.1:80")).await.unwrap();
    db.insert_wallet("0xB", "k", None).await.unwrap();

    assert!(!db.set_proxy_if_empty("0xA", "9.9.9.9:80").await.unwrap());
    assert!(db.set_proxy_if_empty("0xB", "9.9.9.9:80").await.unwrap());

    let a = db.get_wallet("0xA").await.unwrap().unwrap();
    let b = db.get_wallet("0xB").await.unwrap().unwrap();
    assert_eq!(a.proxy.as_deref(), Some("1.1.1.1:80"));
    assert_eq!(b.proxy.as_deref(), Some("9.9.9.9:80"));
}

#[tokio::test]
async fn test_balance_and_clear() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    db.insert_wallet("0xA", "k", None).await.unwrap();
    db.insert_wallet("0xB", "k", None).await.unwrap();

    db.update_balance("0xA", 0.25).await.unwrap();
    let a = db.get_wallet("0xA").await.unwrap().unwrap();
    assert_eq!(a.balance, Some(0.25));

    assert_eq!(db.clear_wallets().await.unwrap(), 2);
    assert_eq!(db.count_wallets().await.unwrap(), 0);
    assert!(db.get_wallet("0xA").await.unwrap().is_none());
}

#[tokio::test]
async fn test_task_history() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;

    db.log_task_result("0xA", "bean", true, "ok", 1200).await.unwrap();
    db.log_task_result("0xA", "magma", false, "reverted", 800).await.unwrap();
    db.log_task_result("0xB", "bean", true, "ok", 900).await.unwrap();

    let history = db.get_task_history("0xA", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].task_name, "magma");
    assert_eq!(history[0].status, "FAILED");
    assert_eq!(db.get_success_count("0xA").await.unwrap(), 1);

    let metrics = db.get_metrics();
    assert_eq!(metrics.total_inserts, 3);
    assert_eq!(metrics.total_errors, 0);
    assert_eq!(metrics.timed_queries, metrics.total_queries);
    assert!(metrics.avg_query_time_ms < 5_000);
}
