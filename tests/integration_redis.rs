//! Integration tests against a real Redis instance
//!
//! Run with a server on `REDIS_URL` (default `redis://127.0.0.1:6379`):
//!
//! ```text
//! cargo test --test integration_redis -- --ignored
//! ```

mod common;

use std::collections::HashSet;

use common::*;
use resilient_cache::{BackendState, CacheBackend, CacheConfig, CacheError, CacheSystem, RedisCache};

async fn redis_system() -> CacheSystem {
    let cache = CacheSystem::with_redis_url(&redis_url()).await;
    assert_eq!(cache.health().state, BackendState::Active, "Redis is not reachable");
    cache
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_set_get_ttl() {
    let cache = redis_system().await;
    let client = cache.cache_client();
    let key = test_key("redis_basic");
    let quote = test_data::Quote::new("MSFT", 415.2);

    client.set_with_ttl(&key, &quote, 3600).await.unwrap();
    assert_eq!(client.get::<test_data::Quote>(&key).await.unwrap(), Some(quote));

    let ttl = client.ttl(&key).await.unwrap();
    assert!(ttl > 3590 && ttl <= 3600);

    assert!(client.persist(&key).await.unwrap());
    assert_eq!(client.ttl(&key).await.unwrap(), -1);
    assert_eq!(client.del(&[key.as_str()]).await.unwrap(), 1);
    assert_eq!(client.ttl(&key).await.unwrap(), -2);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_increment_sets_default_ttl() {
    let cache = redis_system().await;
    let client = cache.cache_client();
    let key = test_key("redis_counter");

    assert_eq!(client.incr(&key).await.unwrap(), 1);
    assert_eq!(client.incr(&key).await.unwrap(), 2);
    let ttl = client.ttl(&key).await.unwrap();
    assert!(ttl > 0 && ttl <= 60);

    let text = test_key("redis_text");
    client.set_with_ttl(&text, &"alice", 60).await.unwrap();
    assert!(matches!(client.incr(&text).await, Err(CacheError::TypeMismatch(_))));
    assert_eq!(cache.health().state, BackendState::Active);

    client.del(&[key.as_str(), text.as_str()]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_keys_and_mget() {
    let cache = redis_system().await;
    let client = cache.cache_client();
    let prefix = test_key("redis_scan");
    let a = format!("{prefix}:a");
    let b = format!("{prefix}:b");
    let literal = format!("{prefix}?x");

    client.set_with_ttl(&a, &1, 60).await.unwrap();
    client.set_with_ttl(&b, &2, 60).await.unwrap();
    client.set_with_ttl(&literal, &3, 60).await.unwrap();

    let keys = client.keys(&format!("{prefix}:*")).await.unwrap();
    assert_eq!(keys, HashSet::from([a.clone(), b.clone()]));
    assert_eq!(client.keys(&literal).await.unwrap(), HashSet::from([literal.clone()]));

    let values: Vec<Option<i32>> = client.mget(&[b.as_str(), "missing", a.as_str()]).await.unwrap();
    assert_eq!(values, vec![Some(2), None, Some(1)]);

    client.del(&[a.as_str(), b.as_str(), literal.as_str()]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_pipeline_and_rate_limit() {
    let cache = redis_system().await;
    let client = cache.cache_client();
    let a = test_key("redis_pipe_a");
    let bad = test_key("redis_pipe_bad");

    let outcomes = client
        .pipeline()
        .set(a.as_str(), &"x", 60)
        .unwrap()
        .set(bad.as_str(), &"y", 0)
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1], Err(CacheError::InvalidArgument(_))));
    assert!(client.exists(&a).await.unwrap());
    assert!(!client.exists(&bad).await.unwrap());

    let id = test_key("redis_rl");
    for _ in 0..3 {
        assert!(cache.rate_limiter().check_rate_limit(&id, 3, 60_000).await.unwrap().allowed);
    }
    assert!(!cache.rate_limiter().check_rate_limit(&id, 3, 60_000).await.unwrap().allowed);

    cache.rate_limiter().reset(&id).await.unwrap();
    client.del(&[a.as_str()]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_backend_health_check() {
    let cache = RedisCache::connect(&redis_url(), &CacheConfig::default()).await.unwrap();
    assert!(cache.health_check().await);
    assert_eq!(cache.name(), "Redis");
}
