//! Choosing and loading the authoritative dimensions document

use super::test_utils::{app_sections, dimensions_doc, write_json, GatedLoader};
use dimconf::{context_from_pairs, ConfigEngine, EngineError, EngineOptions};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn lang_only() -> serde_json::Value {
    json!([{ "dimensions": [{ "lang": { "en": null } }] }])
}

#[tokio::test]
async fn test_shortest_path_wins() {
    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config_contents("long", "dimensions", "ab/dimensions.json", lang_only());
    engine.add_config_contents("short", "dimensions", "a/dimensions.json", dimensions_doc());
    engine.add_config_contents("longer", "dimensions", "abc/dimensions.json", lang_only());

    assert_eq!(
        engine.dimensions_path(),
        Some(PathBuf::from("a/dimensions.json"))
    );
    let dims = engine.read_dimensions().await.unwrap();
    assert_eq!(dims.as_value(), &dimensions_doc()[0]["dimensions"]);
}

#[tokio::test]
async fn test_equal_length_keeps_first() {
    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config_contents("x", "dimensions", "x/dimensions.json", dimensions_doc());
    engine.add_config_contents("y", "dimensions", "y/dimensions.json", lang_only());

    assert_eq!(
        engine.dimensions_path(),
        Some(PathBuf::from("x/dimensions.json"))
    );
}

#[tokio::test]
async fn test_other_config_names_are_not_candidates() {
    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config_contents("core", "dims", "d.json", dimensions_doc());

    assert_eq!(engine.dimensions_path(), None);
    assert!(matches!(
        engine.read_dimensions().await,
        Err(EngineError::MissingDimensions)
    ));
}

#[tokio::test]
async fn test_configured_bundle_only() {
    let options = EngineOptions::default().with_dimensions_bundle("core");
    let engine = ConfigEngine::new(options);
    engine.add_config_contents("app", "dimensions", "a/dimensions.json", lang_only());
    assert_eq!(engine.dimensions_path(), None);

    engine.add_config_contents("core", "dimensions", "vendor/core/dimensions.json", dimensions_doc());
    assert_eq!(
        engine.dimensions_path(),
        Some(PathBuf::from("vendor/core/dimensions.json"))
    );
}

#[tokio::test]
async fn test_explicit_path_overrides_registration() {
    let dir = TempDir::new().unwrap();
    let explicit = write_json(&dir, "pinned/dimensions.json", &dimensions_doc());

    let engine = ConfigEngine::new(EngineOptions::default().with_dimensions_path(&explicit));
    engine.add_config_contents("core", "dimensions", "a.json", lang_only());
    engine.add_config_contents("app", "settings", "app/settings.json", app_sections());

    assert_eq!(engine.dimensions_path(), Some(explicit.clone()));
    let value = engine
        .read("app", "settings", &context_from_pairs([("environment", "prod")]))
        .await
        .unwrap();
    assert_eq!(value["host"], json!("prod.example.com"));
}

#[tokio::test]
async fn test_document_is_loaded_once() {
    let dir = TempDir::new().unwrap();
    let explicit = write_json(&dir, "dimensions.json", &dimensions_doc());

    let loader = GatedLoader::new("never-matches");
    let engine = ConfigEngine::new(EngineOptions::default().with_dimensions_path(&explicit))
        .with_loader(loader.clone());

    let (first, second) = tokio::join!(engine.read_dimensions(), engine.read_dimensions());
    assert_eq!(first.unwrap(), second.unwrap());
    engine.read_dimensions().await.unwrap();
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_document_is_not_reloaded_after_selection_changes() {
    let engine = ConfigEngine::new(EngineOptions::default());
    engine.add_config_contents("core", "dimensions", "core/dimensions.json", dimensions_doc());
    let before = engine.read_dimensions().await.unwrap();

    engine.add_config_contents("c", "dimensions", "c/dimensions.json", lang_only());
    assert_eq!(
        engine.dimensions_path(),
        Some(PathBuf::from("c/dimensions.json"))
    );
    assert_eq!(engine.read_dimensions().await.unwrap(), before);
}
