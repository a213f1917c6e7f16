//! Dimconf: Context-Sensitive Configuration Resolution
//!
//! Resolves configuration values that vary by runtime context (locale, device,
//! environment, ...) using a dimension-based priority merge, and caches resolved
//! output per canonical context fingerprint.
//!
//! ```no_run
//! use dimconf::{context_from_pairs, ConfigEngine, EngineOptions};
//!
//! # async fn run() -> dimconf::Result<()> {
//! let engine = ConfigEngine::new(EngineOptions::default());
//! engine.add_config("core", "dimensions", "core/dimensions.json").await?;
//! engine.add_config("app", "settings", "app/settings.yaml").await?;
//!
//! let ctx = context_from_pairs([("environment", "prod")]);
//! let settings = engine.read("app", "settings", &ctx).await?;
//! println!("{}", settings);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod dimensions;
pub mod engine;
pub mod error;
pub mod format;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod ycb;

pub use crate::config::{CacheOptions, EngineOptions, OptionsLoader};
pub use context::{context_from_pairs, fingerprint, Context};
pub use dimensions::DimensionsDocument;
pub use engine::{ConfigEngine, RegisterOutcome};
pub use error::{EngineError, Result};
