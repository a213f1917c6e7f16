//! Reads through the engine facade: merged, ranked, flat and base-context behavior

use super::test_utils::{app_sections, dimensions_doc, write_json, write_raw};
use dimconf::{context_from_pairs, ConfigEngine, Context, EngineError, EngineOptions};
use serde_json::json;
use tempfile::TempDir;

async fn setup(options: EngineOptions) -> (TempDir, ConfigEngine) {
    let dir = TempDir::new().unwrap();
    let dims = write_json(&dir, "core/dimensions.json", &dimensions_doc());
    let app = write_json(&dir, "app/settings.json", &app_sections());

    let engine = ConfigEngine::new(options);
    engine.add_config("core", "dimensions", &dims).await.unwrap();
    engine.add_config("app", "settings", &app).await.unwrap();
    (dir, engine)
}

#[tokio::test]
async fn test_read_merged_value() {
    let (_dir, engine) = setup(EngineOptions::default()).await;
    let ctx = context_from_pairs([("environment", "staging"), ("lang", "en_US")]);

    let value = engine.read("app", "settings", &ctx).await.unwrap();
    assert_eq!(
        *value,
        json!({ "host": "prod.example.com", "greeting": "hello", "db": { "pool": 50 } })
    );
}

#[tokio::test]
async fn test_read_no_merge_ranked_most_specific_first() {
    let (_dir, engine) = setup(EngineOptions::default()).await;
    let ctx = context_from_pairs([("environment", "prod"), ("lang", "fr")]);

    let ranked = engine.read_no_merge("app", "settings", &ctx).await.unwrap();
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0], json!({ "greeting": "bonjour" }));
    assert_eq!(ranked[1]["host"], json!("prod.example.com"));
    assert_eq!(ranked[2]["host"], json!("localhost"));
}

#[tokio::test]
async fn test_unknown_bundle_and_config() {
    let (_dir, engine) = setup(EngineOptions::default()).await;

    let err = engine.read("nope", "x", &Context::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownBundle { ref bundle } if bundle == "nope"));

    let err = engine
        .read_no_merge("app", "nope", &Context::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::UnknownConfig { ref bundle, ref config } if bundle == "app" && config == "nope")
    );
}

#[tokio::test]
async fn test_base_context_precedence() {
    let options = EngineOptions::default()
        .with_base_context(context_from_pairs([("environment", "prod")]));
    let (_dir, engine) = setup(options).await;

    // explicit key wins over the base context
    let dev = engine
        .read("app", "settings", &context_from_pairs([("environment", "dev")]))
        .await
        .unwrap();
    assert_eq!(dev["host"], json!("localhost"));

    // base key applies when absent from the call
    let en = engine
        .read("app", "settings", &context_from_pairs([("lang", "en")]))
        .await
        .unwrap();
    let expected = engine
        .read(
            "app",
            "settings",
            &context_from_pairs([("environment", "prod"), ("lang", "en")]),
        )
        .await
        .unwrap();
    assert_eq!(*en, *expected);
    assert_eq!(en["host"], json!("prod.example.com"));
}

#[tokio::test]
async fn test_flat_document_passthrough() {
    let (dir, engine) = setup(EngineOptions::default()).await;
    let flat = json!({ "port": 8080, "features": ["a", "b"] });
    let path = write_json(&dir, "app/plain.json", &flat);
    engine.add_config("app", "plain", &path).await.unwrap();

    for ctx in [
        Context::new(),
        context_from_pairs([("environment", "prod"), ("lang", "fr")]),
    ] {
        assert_eq!(*engine.read("app", "plain", &ctx).await.unwrap(), flat);
        assert_eq!(
            *engine.read_no_merge("app", "plain", &ctx).await.unwrap(),
            vec![flat.clone()]
        );
    }
}

#[tokio::test]
async fn test_flat_document_needs_no_dimensions() {
    let dir = TempDir::new().unwrap();
    let path = write_raw(&dir, "app/plain.yaml", "port: 8080\nname: demo\n");
    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config("app", "plain", &path).await.unwrap();

    let value = engine.read("app", "plain", &Context::new()).await.unwrap();
    assert_eq!(*value, json!({ "port": 8080, "name": "demo" }));
}

#[tokio::test]
async fn test_yaml_sections() {
    let (dir, engine) = setup(EngineOptions::default()).await;
    let path = write_raw(
        &dir,
        "app/limits.yml",
        "- settings: [master]\n  rate: 10\n- settings: ['environment:prod']\n  rate: 1000\n",
    );
    engine.add_config("app", "limits", &path).await.unwrap();

    let prod = engine
        .read("app", "limits", &context_from_pairs([("environment", "prod")]))
        .await
        .unwrap();
    assert_eq!(prod["rate"], json!(1000));
}

#[tokio::test]
async fn test_walk_settings_over_file() {
    let (_dir, engine) = setup(EngineOptions::default()).await;
    let mut hosts = Vec::new();
    engine
        .walk_settings("app", "settings", |settings, body| {
            if let Some(host) = body.get("host") {
                hosts.push((settings.to_vec(), host.clone()));
            }
            true
        })
        .await
        .unwrap();

    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[1].0, vec!["environment:prod".to_string()]);
}
