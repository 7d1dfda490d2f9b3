use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use s3sync_lib::{
    run_sync, FailurePolicy, MemoryStore, RunOutcome, SyncConfig, SyncError,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn seeded_store(keys: &[String], page_size: usize) -> MemoryStore {
    let store = MemoryStore::new().with_page_size(page_size);
    store.create_bucket("src");
    for key in keys {
        store.put("src", key, format!("body of {}", key));
    }
    store
}

fn numbered_keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{:04}", prefix, i)).collect()
}

async fn run(config: &SyncConfig, store: Arc<MemoryStore>) -> RunOutcome {
    tokio::time::timeout(RUN_TIMEOUT, run_sync(config, store))
        .await
        .expect("sync did not terminate")
        .expect("sync failed to start")
}

fn copy_config(source: &str, dest: &str, workers: usize) -> SyncConfig {
    SyncConfig::new(source, dest).unwrap().with_workers(workers)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn copies_exactly_the_listed_keys_for_any_page_size() {
    let mut keys = numbered_keys("data/", 37);
    keys.push("other/ignored".to_string());

    for page_size in [1, 5, 1000] {
        let store = Arc::new(seeded_store(&keys, page_size));
        let config = copy_config("s3://src/data/", "s3://dst/", 4);

        let outcome = run(&config, store.clone()).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.report.discovered, 37, "page size {}", page_size);
        assert_eq!(outcome.report.transferred, 37);
        let copied: BTreeSet<String> = store.keys("dst").into_iter().collect();
        let expected: BTreeSet<String> = keys
            .iter()
            .filter(|k| k.starts_with("data/"))
            .cloned()
            .collect();
        assert_eq!(copied, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn terminates_for_any_pool_and_queue_size() {
    for workers in [1, 3, 16] {
        for count in [0, 1, 50] {
            let store = Arc::new(seeded_store(&numbered_keys("k", count), 7));
            let config = copy_config("s3://src", "s3://dst/out/", workers).with_queue_capacity(2);

            let outcome = run(&config, store).await;

            assert!(outcome.error.is_none());
            assert!(outcome.report.is_success());
            assert_eq!(outcome.report.discovered, count as u64);
            assert_eq!(outcome.report.transferred, count as u64);
        }
    }
}

#[tokio::test]
async fn empty_namespace_is_a_clean_success() {
    let store = Arc::new(seeded_store(&[], 10));
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::new("s3://src/nothing/", dir.path().to_str().unwrap()).unwrap();

    let report = run(&config, store).await.into_result().unwrap();

    assert_eq!(report.discovered, 0);
    assert_eq!(report.transferred, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn downloads_into_nested_directories() {
    let keys = vec![
        "a/b/c.txt".to_string(),
        "a/d.txt".to_string(),
        "top.txt".to_string(),
    ];
    let store = Arc::new(seeded_store(&keys, 2));
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("out");
    let config = SyncConfig::new("s3://src", root.to_str().unwrap())
        .unwrap()
        .with_workers(2);

    let report = run(&config, store).await.into_result().unwrap();

    assert_eq!(report.transferred, 3);
    assert!(root.join("a").join("b").is_dir());
    assert_eq!(
        std::fs::read_to_string(root.join("a/b/c.txt")).unwrap(),
        "body of a/b/c.txt"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("top.txt")).unwrap(),
        "body of top.txt"
    );
}

#[tokio::test]
async fn copy_lands_under_destination_prefix() {
    let store = Arc::new(seeded_store(&["k".to_string()], 10));
    let config = copy_config("s3://src", "s3://dst/p/", 1);

    let report = run(&config, store.clone()).await.into_result().unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(store.keys("dst"), vec!["p/k".to_string()]);
    assert_eq!(&store.get("dst", "p/k").unwrap()[..], b"body of k");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listing_failure_still_transfers_first_page() {
    let keys = numbered_keys("k", 10);
    let store = seeded_store(&keys, 4).with_listing_failure_after(1);
    let store = Arc::new(store);
    let config = copy_config("s3://src", "s3://dst/", 3);

    let outcome = run(&config, store.clone()).await;

    assert!(matches!(outcome.error, Some(SyncError::Listing { .. })));
    assert_eq!(outcome.report.discovered, 4);
    assert_eq!(outcome.report.transferred, 4);
    assert_eq!(store.keys("dst"), keys[..4].to_vec());
    assert!(outcome.into_result().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_worker_stops_while_others_drain() {
    let keys = numbered_keys("k", 40);
    let store = Arc::new(seeded_store(&keys, 10).with_failing_key("k0005"));
    let config = copy_config("s3://src", "s3://dst/", 4);

    let outcome = run(&config, store.clone()).await;
    let report = outcome.report;

    assert!(outcome.error.is_none());
    assert_eq!(report.discovered, 40);
    assert_eq!(report.transferred, 39);
    assert!(report.transferred < report.discovered);
    assert_eq!(report.workers_stopped_early, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.as_deref(), Some("k0005"));
    assert!(!report.is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn skip_policy_transfers_everything_else() {
    let keys = numbered_keys("k", 20);
    let store = Arc::new(
        seeded_store(&keys, 3)
            .with_failing_key("k0002")
            .with_failing_key("k0011"),
    );
    let config =
        copy_config("s3://src", "s3://dst/", 1).with_failure_policy(FailurePolicy::SkipObject);

    let report = run(&config, store).await.report;

    assert_eq!(report.transferred, 18);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.workers_stopped_early, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dead_pool_does_not_block_the_lister() {
    let keys = numbered_keys("k", 30);
    let mut store = seeded_store(&keys, 5);
    for key in &keys {
        store = store.with_failing_key(key.clone());
    }
    let config = copy_config("s3://src", "s3://dst/", 2);

    let outcome = run(&config, Arc::new(store)).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.report.transferred, 0);
    assert_eq!(outcome.report.failures.len(), 2);
    assert_eq!(outcome.report.workers_stopped_early, 2);
    // One descriptor per worker, plus at most one left in the single queue slot.
    assert!(
        (2..=3).contains(&outcome.report.discovered),
        "discovered {}",
        outcome.report.discovered
    );
}

#[tokio::test]
async fn keys_differing_by_empty_segments_never_share_a_file() {
    let keys = vec!["a/b".to_string(), "a//b".to_string()];
    let store = Arc::new(seeded_store(&keys, 10));
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::new("s3://src", dir.path().to_str().unwrap())
        .unwrap()
        .with_workers(2)
        .with_failure_policy(FailurePolicy::SkipObject);

    let outcome = run(&config, store).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.report.transferred, 1);
    assert_eq!(outcome.report.failures.len(), 1);
    assert_eq!(outcome.report.failures[0].key.as_deref(), Some("a//b"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a/b")).unwrap(),
        "body of a/b"
    );
}

#[tokio::test]
async fn unusable_destination_root_aborts_before_listing() {
    let store = Arc::new(seeded_store(&numbered_keys("k", 3), 10));
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("taken");
    std::fs::write(&root, "a file, not a directory").unwrap();
    let config = SyncConfig::new("s3://src", root.to_str().unwrap()).unwrap();

    let result = run_sync(&config, store.clone()).await;

    assert!(matches!(result, Err(SyncError::LocalIo { .. })));
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_io_failure_mid_run_fails_the_run() {
    let mut keys = numbered_keys("ok/", 5);
    keys.push("blocked/file.txt".to_string());
    let store = Arc::new(seeded_store(&keys, 2));
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blocked"), "in the way").unwrap();
    let config = SyncConfig::new("s3://src", dir.path().to_str().unwrap())
        .unwrap()
        .with_workers(2);

    let outcome = run(&config, store).await;

    assert!(matches!(outcome.error, Some(SyncError::LocalIo { .. })));
    assert!(outcome.report.transferred < 6);
}
