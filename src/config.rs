use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::origin::{OriginClassifier, PackagePattern};
use crate::report::Level;
use crate::repository::TypeRoots;
use crate::scan::default_m2_repository;

const DEFAULT_INTERNAL_PACKAGES: &[&str] = &[
    "org.gradle.internal",
    "org.gradle.**.internal.**",
    "net.rubygrapefruit",
];
const DEFAULT_HOST_PACKAGES: &[&str] = &["org.gradle", "net.rubygrapefruit"];
const DEFAULT_RUNTIME_PACKAGES: &[&str] = &[
    "java",
    "javax",
    "jdk",
    "groovy",
    "org.codehaus.groovy",
    "kotlin",
    "org.slf4j",
];

/// Analyzer settings. Missing keys in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub minimum_level: Level,
    pub internal_packages: Vec<PackagePattern>,
    pub host_packages: Vec<PackagePattern>,
    pub runtime_packages: Vec<PackagePattern>,
    pub required_task_superclass: String,
    pub task_type: String,
    pub plugin_type: String,
    /// Host API binaries appended to every artifact's class universe.
    pub runtime_classpath: Vec<PathBuf>,
    pub threads: Option<usize>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            minimum_level: Level::Info,
            internal_packages: builtin_patterns(DEFAULT_INTERNAL_PACKAGES),
            host_packages: builtin_patterns(DEFAULT_HOST_PACKAGES),
            runtime_packages: builtin_patterns(DEFAULT_RUNTIME_PACKAGES),
            required_task_superclass: "org.gradle.api.DefaultTask".to_string(),
            task_type: "org.gradle.api.Task".to_string(),
            plugin_type: "org.gradle.api.Plugin".to_string(),
            runtime_classpath: Vec::new(),
            threads: None,
        }
    }
}

fn builtin_patterns(list: &[&str]) -> Vec<PackagePattern> {
    list.iter().filter_map(|p| p.parse().ok()).collect()
}

impl AnalyzerConfig {
    /// Reads a TOML config file, or the defaults when no file is given.
    /// Relative `runtime_classpath` entries are taken relative to the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        if let Some(base) = path.parent() {
            for entry in &mut config.runtime_classpath {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
        Ok(config)
    }

    pub fn with_overrides(mut self, minimum_level: Option<Level>, threads: Option<usize>) -> Self {
        if let Some(level) = minimum_level {
            self.minimum_level = level;
        }
        if threads.is_some() {
            self.threads = threads;
        }
        self
    }

    pub fn classifier(&self) -> OriginClassifier {
        OriginClassifier::new(
            self.internal_packages.clone(),
            self.runtime_packages.clone(),
            self.host_packages.clone(),
        )
    }

    pub fn roots(&self) -> TypeRoots {
        TypeRoots {
            task_type: self.task_type.clone(),
            plugin_type: self.plugin_type.clone(),
        }
    }
}

/// One artifact to analyze. Explicit `paths` skip coordinate resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactRequest {
    pub coordinates: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathBuf>,
}

impl ArtifactRequest {
    pub fn new(coordinates: impl Into<String>) -> Self {
        Self {
            coordinates: coordinates.into(),
            source_url: None,
            paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ArtifactRequest>,
}

impl BatchManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        if let Some(base) = path.parent() {
            for entry in manifest.artifacts.iter_mut().flat_map(|a| a.paths.iter_mut()) {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
        Ok(manifest)
    }
}

pub fn resolve_m2_repo(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.m2.clone() {
        return Ok(p);
    }
    default_m2_repository()
}

pub fn resolve_cache_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.cache.clone() {
        return Ok(p);
    }

    Ok(plugin_analyzer_home()?.join("universe.lmdb"))
}

pub fn clear_cache(db_path: &Path) -> Result<()> {
    remove_file_if_exists(db_path, "cache")?;
    remove_file_if_exists(&lmdb_lock_path(db_path), "cache lock")?;
    Ok(())
}

fn plugin_analyzer_home() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(dirs::data_local_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve cache directory"))?;
    Ok(base.join("plugin-analyzer"))
}

fn lmdb_lock_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push("-lock");
    PathBuf::from(os)
}

fn remove_file_if_exists(path: &Path, kind: &str) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {kind} file: {}", path.display()))?;
    }
    Ok(())
}
