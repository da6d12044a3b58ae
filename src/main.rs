// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use paas_router::cluster::{
    ALL_CLUSTERS, ALL_KEYWORD, ClusterClientResolver, ClusterRegistry, ClusterSelector,
    ClusterSpecMatcher, CredentialLocator, KubeClientFactory, ResolveOptions,
};
use output::{Listing, clusters_listing};
use paas_router::config::{self, Config};
use paas_router::progress::{ProgressUpdate, create_spinner};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool, to_stderr: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("paas-router.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose {
        "paas_router=debug"
    } else {
        "paas_router=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if to_stderr {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    init_logging(args.verbose, args.verbose);

    let config = Config::resolve(&args.overrides())?;

    match &args.command {
        Command::Clusters => run_clusters(&args, &config).await,
        Command::Select { spec } => run_select(&args, &config, spec).await,
        Command::Resolve { spec, .. } => run_resolve(&args, &config, spec).await,
        Command::Config { save } => show_config(&args, &config, *save),
    }
}

/// Fetch the cluster list behind a spinner
async fn load_registry(config: &Config) -> Result<Arc<ClusterRegistry>> {
    let registry = Arc::new(ClusterRegistry::new(config));
    let spinner = create_spinner("Fetching cluster list...");
    let mut progress_rx = registry.progress().subscribe();

    let result = {
        let mut refresh = Box::pin(registry.refresh());
        loop {
            tokio::select! {
                biased;
                progress = progress_rx.recv() => {
                    if let Ok(ProgressUpdate::Refreshing { url }) = progress {
                        spinner.set_message(format!("Fetching {}...", url));
                    }
                }
                result = &mut refresh => {
                    break result;
                }
            }
        }
    };

    spinner.finish_and_clear();
    result?;
    Ok(registry)
}

async fn run_clusters(args: &Args, config: &Config) -> Result<()> {
    let registry = load_registry(config).await?;
    let snapshot = registry.snapshot().await;
    let listing = clusters_listing(snapshot.iter());
    println!("{}", listing.format(&args.output, args.no_headers));
    Ok(())
}

async fn run_select(args: &Args, config: &Config, spec: &str) -> Result<()> {
    let registry = load_registry(config).await?;
    let ids = registry.ids().await;
    let selector = ClusterSpecMatcher::new(&ids).resolve(spec)?;

    let snapshot = registry.snapshot().await;
    let listing = clusters_listing(selector.filter(&snapshot));
    println!("{}", listing.format(&args.output, args.no_headers));

    let parameter = selector.request_parameter();
    if parameter == ALL_CLUSTERS {
        eprintln!("Request parameter: (all clusters)");
    } else {
        eprintln!("Request parameter: {}", parameter);
    }
    Ok(())
}

/// Plain ids are taken literally so ids missing from the registry can still
/// be resolved permissively; patterns are expanded against the registry
fn selector_for(spec: &str, ids: &[String]) -> Result<ClusterSelector> {
    let spec = spec.trim();
    let is_pattern = spec == ALL_KEYWORD || spec.contains([',', '*', '?']);
    if is_pattern {
        Ok(ClusterSpecMatcher::new(ids).resolve(spec)?)
    } else {
        Ok(ClusterSelector::new([spec]))
    }
}

async fn run_resolve(args: &Args, config: &Config, spec: &str) -> Result<()> {
    let registry = load_registry(config).await?;
    let ids = registry.ids().await;
    let selector = selector_for(spec, &ids)?;

    let resolver = ClusterClientResolver::new(
        Arc::clone(&registry),
        CredentialLocator::from_config(config),
        KubeClientFactory::new(),
        ResolveOptions::from_config(config),
    );

    let spinner = create_spinner("Resolving clusters...");
    let mut progress_rx = registry.progress().subscribe();

    let results = {
        let mut resolve = Box::pin(resolver.resolve_selected(&selector));
        loop {
            tokio::select! {
                biased;
                progress = progress_rx.recv() => {
                    match progress {
                        Ok(ProgressUpdate::Stage { cluster, stage }) => {
                            spinner.set_message(format!("{}: {}", cluster, stage));
                        }
                        Ok(ProgressUpdate::ClusterComplete { cluster, ok, elapsed_ms }) => {
                            let outcome = if ok { "resolved" } else { "failed" };
                            spinner.set_message(format!("{}: {} in {}ms", cluster, outcome, elapsed_ms));
                        }
                        _ => {}
                    }
                }
                results = &mut resolve => {
                    break results;
                }
            }
        }
    };

    spinner.finish_and_clear();

    let mut listing = Listing::new(&["cluster", "endpoint", "credential", "version", "error"]);
    let mut failed = 0;
    for (id, result) in &results {
        match result {
            Ok(resolved) => listing.push(vec![
                id.clone(),
                resolved.endpoint.clone(),
                resolved.credential_path.display().to_string(),
                resolved.version.git_version.clone(),
                String::new(),
            ]),
            Err(e) => {
                failed += 1;
                listing.push(vec![
                    id.clone(),
                    String::new(),
                    String::new(),
                    String::new(),
                    e.to_string(),
                ]);
            }
        }
    }
    println!("{}", listing.format(&args.output, args.no_headers));

    if failed > 0 {
        return Err(anyhow!(
            "{} of {} clusters failed to resolve",
            failed,
            results.len()
        ));
    }
    Ok(())
}

/// Print the effective config; `--save` writes only the file layer plus flags
fn show_config(args: &Args, config: &Config, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        Config::save_overrides(&args.overrides())?;
        eprintln!("Saved to {}", Config::config_path()?.display());
    }
    Ok(())
}
