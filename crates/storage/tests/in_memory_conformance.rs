use covenant_storage::conformance::run_conformance_suite;
use covenant_storage::InMemoryVault;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_vault_passes_conformance() {
    let report = run_conformance_suite(|| async { InMemoryVault::new() }).await;
    assert!(report.total > 0);
    assert!(report.failed == 0, "{report}");
}

#[tokio::test]
async fn report_lists_every_category() {
    let report = run_conformance_suite(|| async { InMemoryVault::new() }).await;
    for category in ["record", "consume", "snapshot", "error", "concurrent"] {
        assert!(
            report.results.iter().any(|r| r.category == category),
            "missing category {category}"
        );
    }
}
