mod cli;
mod config;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use spine_compute::{
    ClusterRequest, ClusteringEngine, ClusteringMethod, DomainFeatureSet, FeatureMatrix,
    ForecastMethod, ForecastRequest, ForecastingEngine, SegmentRegistry, TimeSeries,
};

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = config::load(args.config.as_deref(), args.profile.as_deref())
        .context("failed to load configuration")?;
    config.log_summary();

    match args.command {
        Command::Cluster {
            input,
            k,
            method,
            domain,
        } => {
            let matrix: FeatureMatrix = read_json(&input)?;
            let method: ClusteringMethod = method.parse()?;
            let request = ClusterRequest::method(method, k);
            let engine = ClusteringEngine::new(config.clustering, &config.cache);

            match domain {
                Some(domain) => {
                    let features = DomainFeatureSet::builtin(&domain)
                        .ok_or_else(|| anyhow!("unknown domain: {}", domain))?;
                    let mut registry = SegmentRegistry::new();
                    let segments = engine.segment(&matrix, &features, &request, &mut registry)?;
                    info!(domain = %domain, segments = segments.len(), "Segmented");
                    print_json(&segments, args.pretty)?;
                }
                None => {
                    let result = engine.cluster_with(&matrix, &request)?;
                    print_json(&result, args.pretty)?;
                }
            }
        }
        Command::Forecast {
            input,
            horizon,
            method,
            adaptive,
        } => {
            let series: TimeSeries = read_json(&input)?;
            let method: ForecastMethod = method.parse()?;
            let request = ForecastRequest {
                horizon,
                method,
                adaptive: adaptive.then_some(true),
            };
            let engine = ForecastingEngine::new(config.forecast, &config.cache);
            let result = engine.forecast_with(&series, &request)?;
            print_json(&result, args.pretty)?;
        }
        Command::Config => print_json(&config.summary(), true)?,
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse input: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
