use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::Instant;

use place_resolver_lib::{init_tracing, PlacePipeline, ResolverConfig};

#[derive(Debug, Parser)]
#[command(name = "resolve-place")]
#[command(about = "Resolve a map-service place link into a catalog record")]
struct Cli {
    /// Map link to resolve, shortened or expanded
    url: String,
    /// Pretty-print the JSON record
    #[arg(long)]
    pretty: bool,
    /// Abandon the resolution after this many seconds
    #[arg(long, env = "RESOLVE_DEADLINE_SECS")]
    deadline_secs: Option<u64>,
    /// Print the effective configuration (without secrets) and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ResolverConfig::from_env();

    if cli.show_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.public_profile())?
        );
        return Ok(());
    }

    let pipeline = PlacePipeline::new(&config).context("failed to build resolver")?;
    let resolution = match cli.deadline_secs {
        Some(secs) => {
            pipeline
                .resolve_before(&cli.url, Instant::now() + Duration::from_secs(secs))
                .await
        }
        None => pipeline.resolve(&cli.url).await,
    }
    .with_context(|| format!("could not resolve {}", cli.url))?;

    for degradation in &resolution.degradations {
        tracing::warn!(%degradation, "resolution degraded");
    }

    let output = if cli.pretty {
        serde_json::to_string_pretty(&resolution)?
    } else {
        serde_json::to_string(&resolution)?
    };
    println!("{output}");
    Ok(())
}
