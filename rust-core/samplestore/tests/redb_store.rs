// SPDX-License-Identifier: PMPL-1.0-or-later
//! Sampling store on a real redb database file.

#![cfg(feature = "redb-backend")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use samplestore::{
    service_operation_map, BackendKind, SamplingStore, SamplingStoreConfig, ServiceOperationQPS,
    Throughput,
};
use samplestore_kv::RedbBackend;
use tempfile::TempDir;

fn open(dir: &TempDir) -> SamplingStore<RedbBackend> {
    SamplingStore::new(RedbBackend::open(dir.path().join("sampling.redb")).unwrap())
}

#[tokio::test]
async fn test_throughput_window_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let start = Utc::now();
    let expected = vec![
        Throughput::new("my-svc", "op"),
        Throughput::new("our-svc", "op2"),
    ];

    store.insert_throughput(&expected).await.unwrap();

    let actual = store
        .get_throughput(start, start + Duration::seconds(10))
        .await
        .unwrap();
    assert_eq!(actual, expected);

    let earlier = store
        .get_throughput(start - Duration::hours(2), start - Duration::hours(1))
        .await
        .unwrap();
    assert!(earlier.is_empty());
}

#[tokio::test]
async fn test_latest_probabilities_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);

    assert_eq!(store.get_latest_probabilities().await.unwrap(), None);

    store
        .insert_probabilities_and_qps(
            "dell11eg843d",
            service_operation_map([("new-srv", "op", 0.1)]),
            service_operation_map([("new-srv", "op", 4.0)]),
        )
        .await
        .unwrap();
    store
        .insert_probabilities_and_qps(
            "newhostname",
            service_operation_map([("new-srv2", "op", 0.123)]),
            service_operation_map([("new-srv2", "op", 1.0)]),
        )
        .await
        .unwrap();

    let latest = store.get_latest_probabilities().await.unwrap();
    assert_eq!(latest, Some(service_operation_map([("new-srv2", "op", 0.123)])));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let start = Utc::now();

    {
        let store = open(&dir);
        store
            .insert_throughput(&[Throughput::new("svc", "op").with_count(42)])
            .await
            .unwrap();
        store
            .insert_probabilities_and_qps(
                "host-a",
                service_operation_map([("svc", "op", 0.5)]),
                ServiceOperationQPS::new(),
            )
            .await
            .unwrap();
    }

    let reopened = open(&dir);
    let throughput = reopened
        .get_throughput(start, Utc::now())
        .await
        .unwrap();
    assert_eq!(throughput, vec![Throughput::new("svc", "op").with_count(42)]);

    let snapshot = reopened.get_latest_probabilities_and_qps().await.unwrap().unwrap();
    assert_eq!(snapshot.hostname, "host-a");

    // A new instance keeps appending after the old data.
    reopened
        .insert_probabilities_and_qps(
            "host-b",
            service_operation_map([("svc", "op", 0.75)]),
            ServiceOperationQPS::new(),
        )
        .await
        .unwrap();
    let latest = reopened.get_latest_probabilities_and_qps().await.unwrap().unwrap();
    assert_eq!(latest.hostname, "host-b");
}

#[tokio::test]
async fn test_concurrent_inserts_are_all_retained() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(&dir));
    let start = Utc::now();

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for cycle in 0..5 {
                store
                    .insert_throughput(&[Throughput::new(format!("svc-{worker}"), format!("op-{cycle}"))])
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let all = store.get_throughput(start, Utc::now()).await.unwrap();
    assert_eq!(all.len(), 40);

    // Per worker, cycles come back in the order they were written.
    for worker in 0..8 {
        let ops: Vec<_> = all
            .iter()
            .filter(|t| t.service == format!("svc-{worker}"))
            .map(|t| t.operation.clone())
            .collect();
        let expected: Vec<_> = (0..5).map(|cycle| format!("op-{cycle}")).collect();
        assert_eq!(ops, expected);
    }
}

#[tokio::test]
async fn test_open_store_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = SamplingStoreConfig {
        backend: BackendKind::Redb,
        path: dir.path().join("nested").join("sampling.redb"),
        ..Default::default()
    };

    let store = config.open_store().unwrap();
    store
        .insert_throughput(&[Throughput::new("svc", "op")])
        .await
        .unwrap();
    assert_eq!(store.backend().name(), "redb");
    assert!(config.path.exists());
}
