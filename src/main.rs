//! API Virtualization Engine - CLI Entry Point

use anyhow::Result;
use apimock_engine::EngineConfig;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "apimock-engine",
    about = "API virtualization engine - resource matching and schema-driven example synthesis",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "apimock.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Synthesize an example for SERVICE/OPERATION and print it
    #[arg(long, value_name = "SERVICE/OPERATION")]
    synthesize: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        EngineConfig::from_file(&args.config)?
    } else if args.validate || args.synthesize.is_some() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no resources)");
        EngineConfig::default()
    };

    // Validate and exit if requested
    if args.validate {
        config.validate()?;
        println!(
            "Configuration is valid ({} resources, {} services defined)",
            config.resources.len(),
            config.services.len()
        );
        return Ok(());
    }

    let engine = apimock_engine::MockEngine::new(config);

    if let Some(target) = &args.synthesize {
        let (service, operation) = target.split_once('/').ok_or_else(|| {
            anyhow::anyhow!("Expected SERVICE/OPERATION, got {:?}", target)
        })?;

        match engine.synthesize_example(service, operation)? {
            Some(example) => println!("{}", example),
            None => anyhow::bail!("Unknown service or operation: {}", target),
        }
        return Ok(());
    }

    // The engine is a library component; without a synthesis target there
    // is nothing further to run standalone.
    println!(
        "Loaded {} resources and {} services; use --validate or --synthesize",
        engine.config().resources.len(),
        engine.config().services.len()
    );

    Ok(())
}
