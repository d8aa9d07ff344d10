//! Degraded Mode Example
//!
//! Demonstrates caching, rate limiting and what happens when Redis is not
//! reachable: the system keeps serving from the in-process store.
//!
//! Run with: cargo run --example degraded_mode
//! Or, to watch the supervisor's log lines:
//!   RUST_LOG=resilient_cache=debug REDIS_URL=redis://127.0.0.1:1 cargo run --example degraded_mode

use resilient_cache::CacheSystem;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Resilient Cache: Degraded Mode ===\n");

    // 1. Initialize from REDIS_URL (unset or unreachable means degraded)
    let cache = CacheSystem::new().await?;
    let health = cache.health();
    println!("Backend state: {:?}", health.state);
    if let Some(reason) = &health.last_failure {
        println!("Last remote failure: {reason}");
    }
    println!();

    // 2. Cache a daily quote series for an hour
    let client = cache.cache_client();
    let quotes = serde_json::json!({
        "symbol": "AAPL",
        "closes": [189.5, 190.1, 191.3]
    });
    client.set_with_ttl("market_data:AAPL:1d", &quotes, 3600).await?;

    if let Some(cached) = client.get::<serde_json::Value>("market_data:AAPL:1d").await? {
        println!("✅ Retrieved from cache: {cached}");
    }
    println!("TTL: {}s\n", client.ttl("market_data:AAPL:1d").await?);

    // 3. Pipeline a batch of writes
    let outcomes = client
        .pipeline()
        .set("market_data:MSFT:1d", &[415.2, 417.9], 3600)?
        .set("market_data:NVDA:1d", &[880.0, 902.5], 3600)?
        .execute()
        .await?;
    println!("Pipeline: {} ops, {} ok", outcomes.len(), outcomes.iter().filter(|o| o.is_ok()).count());
    println!("Keys: {:?}\n", client.keys("market_data:*").await?);

    // 4. Rate limit one caller: 3 requests per 10 seconds
    for attempt in 1..=4 {
        let decision = cache.rate_limiter().check_rate_limit("10.0.0.7", 3, 10_000).await?;
        println!(
            "Request {attempt}: allowed={} remaining={} retry_after={:?}",
            decision.allowed,
            decision.remaining,
            decision.retry_after()
        );
    }
    println!();

    // 5. Health
    if cache.health_check().await {
        println!("✅ Cache system is serving from {}", cache.supervisor.active_backend_name());
    }

    Ok(())
}
