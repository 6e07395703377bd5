use std::sync::Arc;

use sitekit_api::{ParentKind, UserId};
use sitekit_core::{BlockGateway, SchemaRegistry, SessionContext};
use sitekit_store::{MemoryGateway, Snapshot};
use tempfile::TempDir;

#[tokio::test]
async fn snapshot_round_trips_through_a_file() {
    let registry = Arc::new(SchemaRegistry::builtin());
    let gateway = MemoryGateway::new(registry.clone());
    let user = UserId::new();
    let site = gateway.create_site(user, "Blog").await;
    let session = SessionContext::new(user, site);
    let post = gateway
        .create_parent(&session, ParentKind::Post, "Launch Notes")
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    gateway.save_snapshot(&path).await.unwrap();
    assert!(!dir.path().join("store.json.tmp").exists());

    let reloaded = MemoryGateway::load_snapshot(registry, &path).await.unwrap();
    assert_eq!(reloaded.snapshot().await, gateway.snapshot().await);

    let blocks = reloaded
        .load_blocks(&session, &post.to_string())
        .await
        .unwrap();
    assert_eq!(blocks.len(), 1);
}

#[tokio::test]
async fn malformed_snapshot_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Snapshot::read(&path).await.unwrap_err();
    assert!(format!("{:#}", err).contains("broken.json"));
}

#[tokio::test]
async fn missing_sections_default_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, "{}").unwrap();

    let snapshot = Snapshot::read(&path).await.unwrap();
    assert_eq!(snapshot, Snapshot::default());
}
