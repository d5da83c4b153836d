//! Running the standard checks over many artifacts.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::cache::{UniverseCache, open_universe};
use crate::config::{AnalyzerConfig, ArtifactRequest};
use crate::report::{ArtifactIdentity, ArtifactReport};
use crate::repository::TypeRepository;
use crate::resolve::ArtifactResolver;

/// Everything shared by the artifacts of one batch.
pub struct BatchContext<'a> {
    pub config: &'a AnalyzerConfig,
    pub resolver: &'a dyn ArtifactResolver,
    pub cache: Option<&'a UniverseCache>,
}

/// Analyzes one artifact. Resolution and loading failures become a failed
/// report rather than an error.
pub fn analyze_artifact(request: &ArtifactRequest, context: &BatchContext<'_>) -> ArtifactReport {
    let mut identity = ArtifactIdentity::new(&request.coordinates)
        .with_source_url(request.source_url.clone());

    let mut paths: Vec<PathBuf> = if request.paths.is_empty() {
        match context.resolver.resolve(&request.coordinates) {
            Ok(resolved) => {
                if identity.source_url.is_none() {
                    identity.source_url = resolved.source_url;
                }
                resolved.paths
            }
            Err(err) => {
                warn!(coordinates = %request.coordinates, error = %err, "could not resolve artifact");
                return ArtifactReport::failed(identity, err.to_string());
            }
        }
    } else {
        request.paths.clone()
    };
    paths.extend(context.config.runtime_classpath.iter().cloned());

    info!(coordinates = %request.coordinates, locations = paths.len(), "analyzing artifact");
    let universe = match open_universe(&paths, &context.config.runtime_packages, context.cache) {
        Ok(universe) => universe,
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(coordinates = %request.coordinates, error = %reason, "could not load artifact");
            return ArtifactReport::failed(identity, reason);
        }
    };

    let repository = TypeRepository::new(universe, context.config.classifier(), context.config.roots());
    let mut analyzer = Analyzer::new(&repository, context.config.minimum_level);
    analyzer.run_standard_checks(&context.config.required_task_superclass);
    let report = analyzer.finish(identity);
    info!(
        coordinates = %request.coordinates,
        findings = report.finding_count(),
        "finished artifact"
    );
    report
}

/// One report per request, in request order.
pub fn analyze_batch(
    requests: &[ArtifactRequest],
    context: &BatchContext<'_>,
) -> Result<Vec<ArtifactReport>> {
    let run = || -> Vec<ArtifactReport> {
        requests
            .par_iter()
            .map(|request| analyze_artifact(request, context))
            .collect()
    };

    match context.config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("Failed to build analysis thread pool")?;
            Ok(pool.install(run))
        }
        None => Ok(run()),
    }
}
