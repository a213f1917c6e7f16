//! Resolution caching as observed through resolver call counts

use super::test_utils::{app_sections, dimensions_doc, write_json, CountingFactory};
use dimconf::cache::{CacheKey, ResolutionCache, Resolved};
use dimconf::{context_from_pairs, ConfigEngine, Context, EngineError, EngineOptions};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn counted_engine(options: EngineOptions) -> (ConfigEngine, Arc<super::test_utils::Counters>) {
    let (factory, counters) = CountingFactory::new();
    let engine = ConfigEngine::new(options).with_resolver_factory(factory);
    engine.add_config_contents("core", "dimensions", "core/dimensions.json", dimensions_doc());
    engine.add_config_contents("app", "settings", "app/settings.json", app_sections());
    (engine, counters)
}

#[tokio::test]
async fn test_equal_contexts_share_a_cache_entry() {
    let (engine, counters) = counted_engine(EngineOptions::default());

    let first = engine
        .read(
            "app",
            "settings",
            &context_from_pairs([("environment", "prod"), ("lang", "fr")]),
        )
        .await
        .unwrap();
    let second = engine
        .read(
            "app",
            "settings",
            &context_from_pairs([("lang", "fr"), ("environment", "prod")]),
        )
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counters.reads(), 1);
    assert_eq!(counters.builds(), 1);
    assert_eq!(engine.cache_len(), 1);
}

#[tokio::test]
async fn test_modes_are_cached_separately() {
    let (engine, counters) = counted_engine(EngineOptions::default());
    let ctx = context_from_pairs([("environment", "prod")]);

    engine.read("app", "settings", &ctx).await.unwrap();
    engine.read_no_merge("app", "settings", &ctx).await.unwrap();
    engine.read_no_merge("app", "settings", &ctx).await.unwrap();

    assert_eq!(counters.reads(), 2);
    assert_eq!(engine.cache_len(), 2);
}

#[tokio::test]
async fn test_distinct_contexts_resolve_separately() {
    let (engine, counters) = counted_engine(EngineOptions::default());

    let prod = engine
        .read("app", "settings", &context_from_pairs([("environment", "prod")]))
        .await
        .unwrap();
    let dev = engine
        .read("app", "settings", &context_from_pairs([("environment", "dev")]))
        .await
        .unwrap();

    assert_eq!(prod["host"], json!("prod.example.com"));
    assert_eq!(dev["host"], json!("localhost"));
    assert_eq!(counters.reads(), 2);
    // one resolver per path, reused across contexts
    assert_eq!(counters.builds(), 1);
}

#[tokio::test]
async fn test_disabled_cache_resolves_every_time() {
    let (engine, counters) = counted_engine(EngineOptions::default().without_cache());
    let ctx = context_from_pairs([("environment", "prod")]);

    for _ in 0..3 {
        engine.read("app", "settings", &ctx).await.unwrap();
    }
    assert_eq!(counters.reads(), 3);
    assert_eq!(engine.cache_len(), 0);
}

#[tokio::test]
async fn test_bounded_capacity() {
    let (engine, _counters) = counted_engine(EngineOptions::default().with_max_entries(2));

    for lang in ["en", "fr", "en_US"] {
        engine
            .read("app", "settings", &context_from_pairs([("lang", lang)]))
            .await
            .unwrap();
    }
    assert_eq!(engine.cache_len(), 2);
}

#[tokio::test]
async fn test_reregistration_invalidates() {
    let (engine, counters) = counted_engine(EngineOptions::default());
    let ctx = context_from_pairs([("environment", "prod")]);

    let before = engine.read("app", "settings", &ctx).await.unwrap();
    assert_eq!(before["host"], json!("prod.example.com"));

    engine.add_config_contents(
        "app",
        "settings",
        "app/settings.json",
        json!([
            { "settings": ["master"], "host": "localhost" },
            { "settings": ["environment:prod"], "host": "new-prod.example.com" }
        ]),
    );
    assert_eq!(engine.cache_len(), 0);

    let after = engine.read("app", "settings", &ctx).await.unwrap();
    assert_eq!(after["host"], json!("new-prod.example.com"));
    assert_eq!(counters.builds(), 2);
    assert_eq!(counters.reads(), 2);
}

#[tokio::test]
async fn test_delete_drops_cached_results() {
    let (engine, _counters) = counted_engine(EngineOptions::default());
    let ctx = context_from_pairs([("environment", "prod")]);

    engine.read("app", "settings", &ctx).await.unwrap();
    assert_eq!(engine.cache_len(), 1);

    engine.delete_config("app", "settings", "app/settings.json");
    assert_eq!(engine.cache_len(), 0);
    assert!(matches!(
        engine.read("app", "settings", &ctx).await,
        Err(EngineError::UnknownConfig { .. })
    ));
}

#[tokio::test]
async fn test_failed_resolution_is_not_cached() {
    let (factory, counters) = CountingFactory::new();
    let engine = ConfigEngine::new(EngineOptions::default()).with_resolver_factory(factory);
    // a dimension entry with no name cannot be built
    engine.add_config_contents(
        "core",
        "dimensions",
        "core/dimensions.json",
        json!([{ "dimensions": [{}] }]),
    );
    engine.add_config_contents("app", "settings", "app/settings.json", app_sections());

    for _ in 0..2 {
        let err = engine
            .read("app", "settings", &context_from_pairs([("environment", "prod")]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Resolve { .. }));
    }
    assert_eq!(counters.builds(), 2);
    assert_eq!(counters.reads(), 0);
    assert_eq!(engine.cache_len(), 0);
}

#[tokio::test]
async fn test_reloading_shared_path_invalidates_every_config() {
    let dir = TempDir::new().unwrap();
    let shared = write_json(&dir, "shared.json", &json!({ "v": 1 }));

    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config("b", "x", &shared).await.unwrap();
    engine.add_config("b", "y", &shared).await.unwrap();
    assert_eq!(engine.read("b", "x", &Context::new()).await.unwrap()["v"], json!(1));
    assert_eq!(engine.read("b", "y", &Context::new()).await.unwrap()["v"], json!(1));

    write_json(&dir, "shared.json", &json!({ "v": 2 }));
    engine.add_config("b", "y", &shared).await.unwrap();

    let merged = engine.read("b", "x", &Context::new()).await.unwrap();
    let ranked = engine.read_no_merge("b", "x", &Context::new()).await.unwrap();
    assert_eq!(merged["v"], json!(2));
    assert_eq!(*ranked, vec![json!({ "v": 2 })]);
    assert_eq!(engine.read("b", "y", &Context::new()).await.unwrap()["v"], json!(2));
}

#[tokio::test]
async fn test_moving_one_config_keeps_shared_cache_entries() {
    let (factory, counters) = CountingFactory::new();
    let engine = ConfigEngine::new(EngineOptions::default()).with_resolver_factory(factory);
    engine.add_config_contents("core", "dimensions", "core/dimensions.json", dimensions_doc());
    engine.add_config_contents("app", "a", "shared.json", app_sections());
    engine.add_config_contents("app", "b", "shared.json", app_sections());
    let ctx = context_from_pairs([("environment", "prod")]);

    engine.read("app", "a", &ctx).await.unwrap();
    engine.read("app", "b", &ctx).await.unwrap();
    assert_eq!(counters.builds(), 1);
    assert_eq!(counters.reads(), 2);

    engine.add_config_contents("app", "b", "other.json", json!({ "flat": true }));
    let again = engine.read("app", "a", &ctx).await.unwrap();
    assert_eq!(again["host"], json!("prod.example.com"));
    assert_eq!(counters.reads(), 2);
    assert_eq!(counters.builds(), 1);
}

/// Cache that answers every lookup with a ranked value
struct WrongModeCache;

impl ResolutionCache for WrongModeCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<Resolved>, EngineError> {
        Ok(Some(Resolved::Ranked(Arc::new(vec![json!("stale")]))))
    }

    fn put(&self, _key: CacheKey, _value: Resolved) {}

    fn invalidate(&self, _bundle: &str, _config: &str) {}

    fn len(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_hit_for_another_mode_is_treated_as_miss() {
    let engine = ConfigEngine::new(EngineOptions::default()).with_cache(Arc::new(WrongModeCache));
    engine.add_config_contents("b", "app", "app.json", json!({ "x": 1 }));

    let merged = engine.read("b", "app", &Context::new()).await.unwrap();
    assert_eq!(*merged, json!({ "x": 1 }));

    let ranked = engine.read_no_merge("b", "app", &Context::new()).await.unwrap();
    assert_eq!(*ranked, vec![json!("stale")]);
}
