//! Dimconf CLI Binary
//!
//! Registers config files and prints resolved values for a context.

use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use dimconf::logging::{init_logging, LoggingConfig};
use dimconf::{ConfigEngine, Context, EngineOptions, OptionsLoader};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "dimconf", about = "Resolve context-sensitive configuration")]
struct Cli {
    /// Options file (toml, yaml or json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config file to register, as bundle:config:path (repeatable)
    #[arg(long = "file", short = 'f', global = true, value_parser = parse_registration)]
    files: Vec<Registration>,

    /// Base context entry, key=value (repeatable)
    #[arg(long = "base", global = true, value_parser = parse_pair)]
    base: Vec<(String, String)>,

    /// Authoritative dimensions file
    #[arg(long, global = true)]
    dimensions: Option<PathBuf>,

    /// Restrict dimensions selection to this bundle
    #[arg(long, global = true)]
    dimensions_bundle: Option<String>,

    /// Log level override
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format override (text or json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the merged config for a context
    Read(ReadArgs),
    /// Print matching sections, most specific first
    ReadNoMerge(ReadArgs),
    /// Print the authoritative dimensions document
    Dimensions,
}

#[derive(Debug, clap::Args)]
struct ReadArgs {
    bundle: String,

    // `config` id is taken by the global --config flag
    #[arg(id = "config_name", value_name = "CONFIG")]
    config: String,

    /// Context entry, key=value (repeatable)
    #[arg(long = "context", short = 'c', value_parser = parse_pair)]
    context: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Registration {
    bundle: String,
    config: String,
    path: PathBuf,
}

fn parse_registration(raw: &str) -> Result<Registration, String> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(bundle), Some(config), Some(path))
            if !bundle.is_empty() && !config.is_empty() && !path.is_empty() =>
        {
            Ok(Registration {
                bundle: bundle.to_string(),
                config: config.to_string(),
                path: PathBuf::from(path),
            })
        }
        _ => Err(format!("expected bundle:config:path, got '{}'", raw)),
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn to_context(pairs: &[(String, String)]) -> Context {
    dimconf::context_from_pairs(pairs.iter().cloned())
}

/// Build engine options from the options file and CLI flags.
/// Precedence: CLI flags override the options file override defaults.
fn build_options(cli: &Cli) -> anyhow::Result<EngineOptions> {
    let mut options = OptionsLoader::load(cli.config.as_deref())?;
    options.base_context.extend(to_context(&cli.base));
    if let Some(path) = &cli.dimensions {
        options.dimensions_path = Some(path.clone());
    }
    if let Some(bundle) = &cli.dimensions_bundle {
        options.dimensions_bundle = Some(bundle.clone());
    }
    Ok(options)
}

fn build_logging_config(cli: &Cli, options: &EngineOptions) -> LoggingConfig {
    let mut config = options.logging.clone();
    if cli.quiet {
        config.level = "error".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    config
}

async fn run(cli: Cli, options: EngineOptions) -> anyhow::Result<Value> {
    let engine = ConfigEngine::new(options);
    for file in &cli.files {
        engine
            .add_config(&file.bundle, &file.config, &file.path)
            .await
            .with_context(|| format!("registering {}", file.path.display()))?;
    }

    let output = match &cli.command {
        Command::Read(args) => {
            let value = engine
                .read(&args.bundle, &args.config, &to_context(&args.context))
                .await?;
            value.as_ref().clone()
        }
        Command::ReadNoMerge(args) => {
            let values = engine
                .read_no_merge(&args.bundle, &args.config, &to_context(&args.context))
                .await?;
            Value::Array(values.as_ref().clone())
        }
        Command::Dimensions => engine.read_dimensions().await?.as_value().clone(),
    };
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Failed to load options: {:#}", e);
            process::exit(1);
        }
    };

    let logging_config = build_logging_config(&cli, &options);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("dimconf starting");

    let result = run(cli, options).await.and_then(|value| {
        serde_json::to_string_pretty(&value).map_err(|e| anyhow!("serializing output: {}", e))
    });
    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}
