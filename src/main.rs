use anyhow::{Context, Result};
use clap::Parser;
use plugin_analyzer::aggregate::aggregate;
use plugin_analyzer::batch::{BatchContext, analyze_batch};
use plugin_analyzer::cache::UniverseCache;
use plugin_analyzer::cli::{Cli, Commands, OutputFormat};
use plugin_analyzer::config::{
    AnalyzerConfig, ArtifactRequest, BatchManifest, clear_cache, resolve_cache_path,
    resolve_m2_repo,
};
use plugin_analyzer::render::{render_aggregate_markdown, render_reports_json};
use plugin_analyzer::report::ArtifactReport;
use plugin_analyzer::resolve::LocalRepositoryResolver;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command.clone() {
        Commands::ClearCache => {
            let db_path = resolve_cache_path(&cli)?;
            clear_cache(&db_path)?;
        }
        Commands::Render { input, output } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read reports: {}", input.display()))?;
            let reports: Vec<ArtifactReport> = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse reports: {}", input.display()))?;
            let content = render_aggregate_markdown(&aggregate(reports));
            write_output(&content, output.as_deref())?;
        }
        Commands::Analyze {
            manifest,
            artifact,
            paths,
            source_url,
            min_level,
            threads,
            format,
            output,
        } => {
            let config =
                AnalyzerConfig::load(cli.config.as_deref())?.with_overrides(min_level, threads);
            let requests = match (manifest, artifact) {
                (Some(manifest), _) => BatchManifest::load(&manifest)?.artifacts,
                (None, Some(coordinates)) => vec![ArtifactRequest {
                    coordinates,
                    source_url,
                    paths,
                }],
                (None, None) => anyhow::bail!("Either --manifest or --artifact is required"),
            };

            let resolver = LocalRepositoryResolver::new(resolve_m2_repo(&cli)?);
            let cache = if cli.no_cache {
                None
            } else {
                Some(UniverseCache::open(resolve_cache_path(&cli)?)?)
            };
            let context = BatchContext {
                config: &config,
                resolver: &resolver,
                cache: cache.as_ref(),
            };

            let reports = analyze_batch(&requests, &context)?;
            info!(
                artifacts = reports.len(),
                failed = reports.iter().filter(|r| r.is_failed()).count(),
                "analysis complete"
            );
            let content = match format {
                OutputFormat::Json => render_reports_json(&reports)?,
                OutputFormat::Markdown => render_aggregate_markdown(&aggregate(reports)),
            };
            write_output(&content, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
