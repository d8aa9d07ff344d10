//! Pipeline integration tests

mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::*;
use resilient_cache::{BackendState, CacheBackend, CacheConfig, CacheError, MemoryCache, PipelineOp};

#[tokio::test]
async fn test_pipeline_applies_ops_in_order() {
    let cache = memory_system().await;
    let client = cache.cache_client();

    let outcomes = client
        .pipeline()
        .set("p1", &"first", 60)
        .unwrap()
        .set("p2", &"second", 60)
        .unwrap()
        .set("p1", &"overwritten", 60)
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(client.get::<String>("p1").await.unwrap(), Some("overwritten".to_string()));
    assert_eq!(client.get::<String>("p2").await.unwrap(), Some("second".to_string()));
}

#[tokio::test]
async fn test_failed_op_does_not_roll_back() {
    let cache = memory_system().await;
    let client = cache.cache_client();

    let ops = vec![
        PipelineOp::set("ok1", Bytes::from_static(b"1"), 60),
        PipelineOp::set("bad", Bytes::from_static(b"2"), 0),
        PipelineOp::set("ok2", Bytes::from_static(b"3"), 60),
    ];
    let outcomes = client.execute_pipeline(&ops).await.unwrap();

    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1], Err(CacheError::InvalidArgument(_))));
    assert!(outcomes[2].is_ok());

    assert!(client.exists("ok1").await.unwrap());
    assert!(!client.exists("bad").await.unwrap());
    assert!(client.exists("ok2").await.unwrap());
}

#[tokio::test]
async fn test_empty_pipeline() {
    let cache = memory_system().await;
    let pipeline = cache.cache_client().pipeline();
    assert!(pipeline.is_empty());

    let outcomes = pipeline.execute().await.unwrap();
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_pipeline_survives_remote_failure() {
    let remote = FlakyBackend::new();
    let fallback = Arc::new(MemoryCache::new());
    let cache = system_with_remote(Arc::clone(&remote), Arc::clone(&fallback), CacheConfig::default()).await;
    remote.fail();

    let pipeline = cache
        .cache_client()
        .pipeline()
        .set_raw("a", Bytes::from_static(b"1"), 60)
        .set_raw("b", Bytes::from_static(b"2"), 60);
    assert_eq!(pipeline.len(), 2);

    let outcomes = pipeline.execute().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(cache.health().state, BackendState::Degraded);
    assert!(fallback.exists("a").await.unwrap());
    assert!(fallback.exists("b").await.unwrap());
}
