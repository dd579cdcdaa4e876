//! Integration Tests for the Cache Contract
//!
//! Exercises CacheService and StatsRegistry through the public API only.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use statcache::{CacheConfig, CacheService, StatsEventKind, StatsRegistry};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statcache=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn test_cache(registry: &Arc<StatsRegistry>, config: CacheConfig) -> Result<CacheService> {
    init_tracing();
    Ok(CacheService::new(config.with_test_mode(true), registry).await?)
}

/// Payload whose JSON encoding is a little under 0.5 MB.
fn half_megabyte(tag: char) -> String {
    tag.to_string().repeat(500_000)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

// == Read/Write Contract ==

#[tokio::test]
async fn test_default_ttl_scenario() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = test_cache(&registry, CacheConfig::local("ttl-scenario").with_default_ttl(1)).await?;

    cache.set("foo", "bar", None).await?;
    assert_eq!(cache.get::<String>("foo").await?, Some("bar".to_string()));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // No sweep runs in test mode; the read path alone hides the entry
    assert!(!cache.has_key("foo").await?);
    assert_eq!(cache.get::<String>("foo").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_explicit_zero_ttl_overrides_default() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = test_cache(&registry, CacheConfig::local("persist").with_default_ttl(1)).await?;

    cache.set("forever", &42, Some(0)).await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(cache.get::<i32>("forever").await?, Some(42));
    assert_eq!(cache.ttl("forever").await?, Some(None));
    Ok(())
}

#[tokio::test]
async fn test_structured_values_roundtrip() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = test_cache(&registry, CacheConfig::local("sessions")).await?;
    let session = Session {
        user_id: 7,
        roles: vec!["admin".to_string(), "ops".to_string()],
    };

    cache.set("session:7", &session, Some(60)).await?;

    assert_eq!(cache.get::<Session>("session:7").await?, Some(session));
    let key_stats = cache.get_key_stats().expect("key stats enabled by default");
    assert_eq!(key_stats["session:7"].hits, 1);
    assert!(key_stats["session:7"].ttl_remaining.unwrap() <= 60);
    Ok(())
}

// == Memory Pressure ==

#[tokio::test]
async fn test_memory_pressure_scenario() -> Result<()> {
    let registry = StatsRegistry::new();
    let config = CacheConfig::local("bounded").with_max_memory_mb(2);
    let cache = test_cache(&registry, config).await?;
    let max_bytes = 2 * 1024 * 1024;

    for (key, tag) in [("e1", 'a'), ("e2", 'b'), ("e3", 'c'), ("e4", 'd')] {
        cache.set(key, &half_megabyte(tag), None).await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(cache.get_stats().evictions, 0, "four entries fit under 2 MB");

    // e1 becomes the most recently used entry
    assert!(cache.get::<String>("e1").await?.is_some());
    tokio::time::sleep(Duration::from_millis(5)).await;

    cache.set("e5", &half_megabyte('e'), None).await?;
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.set("e6", &half_megabyte('f'), None).await?;

    let stats = cache.get_stats();
    assert!(stats.size_bytes <= max_bytes);
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.keys, 4);
    assert_eq!(stats.keys_deleted, 2);

    let mut keys = cache.keys().await?;
    keys.sort();
    assert_eq!(keys, vec!["e1", "e4", "e5", "e6"]);

    let key_stats = cache.get_key_stats().unwrap();
    assert!(!key_stats.contains_key("e2"));
    assert!(!key_stats.contains_key("e3"));
    Ok(())
}

#[tokio::test]
async fn test_single_oversized_value_is_accepted() -> Result<()> {
    let registry = StatsRegistry::new();
    let config = CacheConfig::local("oversized").with_max_memory_mb(1);
    let cache = test_cache(&registry, config).await?;

    cache.set("small", "x", None).await?;
    cache.set("big", &"y".repeat(1_100_000), None).await?;

    assert!(cache.has_key("big").await?);
    assert!(!cache.has_key("small").await?);
    assert_eq!(cache.get_stats().evictions, 1);
    Ok(())
}

// == Flush ==

#[tokio::test]
async fn test_flush_resets_gauges_keeps_counters() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = test_cache(&registry, CacheConfig::local("flush")).await?;

    cache.set("a", &1, None).await?;
    cache.set("b", &2, None).await?;
    let _ = cache.get::<i32>("a").await?;
    let _ = cache.get::<i32>("missing").await?;
    let before = cache.get_stats();

    cache.flush().await?;

    let after = cache.get_stats();
    assert_eq!(after.keys, 0);
    assert_eq!(after.size_bytes, 0);
    assert_eq!(after.hits, before.hits);
    assert_eq!(after.misses, before.misses);
    assert_eq!(after.keys_added, before.keys_added);
    assert!(!cache.has_key("a").await?);
    assert!(cache.get_key_stats().unwrap().is_empty());

    // Reads after the flush are ordinary misses
    assert_eq!(cache.get::<i32>("b").await?, None);
    assert_eq!(cache.get_stats().misses, before.misses + 1);
    Ok(())
}

// == Registry ==

#[tokio::test]
async fn test_registry_tracks_independent_services() -> Result<()> {
    let registry = StatsRegistry::new();
    let a = test_cache(&registry, CacheConfig::local("A")).await?;
    let b = test_cache(&registry, CacheConfig::local("B")).await?;

    a.set("one", "1", None).await?;
    a.set("two", "2", None).await?;
    b.set("one", "1", None).await?;

    let all = registry.get_all_stats();
    assert_eq!(all.len(), 2);
    assert_eq!(all["A"].keys, 2);
    assert_eq!(all["B"].keys, 1);
    assert_eq!(all["A"].size_bytes, 6);
    assert_eq!(all["B"].size_bytes, 3);

    let key_registry = registry.get_key_stats_registry();
    assert_eq!(key_registry["A"].len(), 2);
    assert_eq!(key_registry["B"].len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shared_identifier_aggregates() -> Result<()> {
    let registry = StatsRegistry::new();
    let first = test_cache(&registry, CacheConfig::local("shared")).await?;
    let second = test_cache(&registry, CacheConfig::local("shared")).await?;

    first.set("x", &1, None).await?;
    second.set("y", &2, None).await?;
    let _ = second.get::<i32>("y").await?;

    assert_eq!(registry.service_ids(), vec!["shared".to_string()]);
    let stats = registry.get_service_stats("shared").unwrap();
    assert_eq!(stats.keys, 2);
    assert_eq!(stats.keys_added, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(first.get_stats(), second.get_stats());

    // The aggregate survives while one member is alive
    drop(first);
    assert!(registry.get_service_stats("shared").is_some());
    drop(second);
    assert!(registry.get_service_stats("shared").is_none());
    Ok(())
}

#[tokio::test]
async fn test_shared_identifier_key_stats_follow_surviving_copy() -> Result<()> {
    let registry = StatsRegistry::new();
    let a = test_cache(&registry, CacheConfig::local("shared-key")).await?;
    let b = test_cache(&registry, CacheConfig::local("shared-key")).await?;

    a.set("k", &1, None).await?;
    b.set("k", &1, None).await?;
    assert!(a.del("k").await?);
    assert_eq!(b.get::<i32>("k").await?, Some(1));

    let stats = registry.get_service_stats("shared-key").unwrap();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.hits, 1);
    let key_stats = b.get_key_stats().unwrap();
    assert_eq!(key_stats["k"].hits, 1);
    assert_eq!(key_stats["k"].size_bytes, 1);
    Ok(())
}

#[tokio::test]
async fn test_stats_visible_immediately_after_mutation() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = test_cache(&registry, CacheConfig::local("immediate")).await?;

    cache.set("k", "v", None).await?;
    assert_eq!(registry.get_service_stats("immediate").unwrap().keys, 1);

    cache.del("k").await?;
    assert_eq!(registry.get_service_stats("immediate").unwrap().keys, 0);
    Ok(())
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sets_same_key() -> Result<()> {
    let registry = StatsRegistry::new();
    let cache = Arc::new(test_cache(&registry, CacheConfig::local("race")).await?);
    let writers = 200;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..writers {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move { cache.set("k", &i, None).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    let value = cache.get::<u32>("k").await?.expect("key must exist");
    assert!(value < writers);
    assert_eq!(cache.len().await?, 1);
    assert_eq!(cache.get_stats().keys, 1);
    assert_eq!(cache.get_stats().keys_added, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations_keep_gauges_consistent() -> Result<()> {
    let registry = StatsRegistry::new();
    let config = CacheConfig::local("mixed").with_max_memory_mb(1);
    let cache = Arc::new(test_cache(&registry, config).await?);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..64u32 {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            let key = format!("key{}", i % 8);
            cache.set(&key, &"z".repeat(50_000), None).await?;
            let _ = cache.get::<String>(&key).await?;
            if i % 3 == 0 {
                cache.del(&key).await?;
            }
            statcache::Result::Ok(())
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    let stats = cache.get_stats();
    assert_eq!(stats.keys, cache.len().await? as u64);
    assert_eq!(stats.size_bytes, stats.keys * 50_002);
    assert_eq!(stats.hits + stats.misses, 64);
    Ok(())
}

// == Background Sweep ==

#[tokio::test]
async fn test_background_sweep_reclaims_expired_entries() -> Result<()> {
    init_tracing();
    let registry = StatsRegistry::new();
    let config = CacheConfig::local("swept").with_sweep_interval(1);
    let cache = CacheService::new(config, &registry).await?;

    cache.set("short", &1, Some(1)).await?;
    cache.set("long", &2, Some(60)).await?;
    assert_eq!(cache.get_stats().keys, 2);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    // Gauges dropped without any read touching the key
    let stats = cache.get_stats();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.evictions, 0);
    assert_eq!(stats.misses, 0);
    assert!(!cache.get_key_stats().unwrap().contains_key("short"));
    Ok(())
}

#[tokio::test]
async fn test_monitoring_events_carry_service_identifier() -> Result<()> {
    init_tracing();
    let registry = StatsRegistry::new();
    let mut events = registry.subscribe();
    let config = CacheConfig::local("dashboard")
        .with_monitoring(true)
        .with_sweep_interval(60);
    let cache = CacheService::new(config, &registry).await?;

    cache.set("k", &1, None).await?;
    cache.set_ttl("k", 30).await?;
    cache.del("k").await?;

    let kinds: Vec<StatsEventKind> = (0..3)
        .map(|_| events.try_recv().map(|event| event.kind))
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(
        kinds,
        vec![StatsEventKind::Set, StatsEventKind::Ttl, StatsEventKind::Delete]
    );
    Ok(())
}

#[tokio::test]
async fn test_test_mode_suppresses_notifications() -> Result<()> {
    let registry = StatsRegistry::new();
    let mut events = registry.subscribe();
    let config = CacheConfig::local("quiet").with_monitoring(true);
    let cache = test_cache(&registry, config).await?;

    cache.set("k", &1, None).await?;

    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_registry_shutdown_leaves_caches_usable() -> Result<()> {
    init_tracing();
    let registry = StatsRegistry::new();
    let cache = CacheService::new(CacheConfig::local("after-shutdown"), &registry).await?;

    registry.shutdown();
    assert!(registry.is_shut_down());

    cache.set("k", &1, Some(1)).await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Sweep has stopped, the read path still enforces expiry
    assert_eq!(cache.get::<i32>("k").await?, None);
    Ok(())
}
