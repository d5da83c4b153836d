//! Turning dependency coordinates into binary locations.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ResolutionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
}

impl Coordinates {
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        let invalid = || ResolutionError::InvalidCoordinates(raw.to_string());
        let (group, artifact, version) = match parts.as_slice() {
            [g, a] => (*g, *a, None),
            [g, a, v] => (*g, *a, Some(*v)),
            _ => return Err(invalid()),
        };
        if group.is_empty() || artifact.is_empty() || version.is_some_and(str::is_empty) {
            return Err(invalid());
        }
        Ok(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            // Gradle's dynamic selectors mean "newest available" locally.
            version: version
                .filter(|v| !matches!(*v, "latest.release" | "latest.integration" | "+"))
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub paths: Vec<PathBuf>,
    pub source_url: Option<String>,
}

pub trait ArtifactResolver: Sync {
    fn resolve(&self, coordinates: &str) -> Result<ResolvedArtifact, ResolutionError>;
}

/// Resolves coordinates against a Maven-layout directory such as `~/.m2/repository`.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    root: PathBuf,
}

impl LocalRepositoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_dir(&self, coordinates: &Coordinates) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in coordinates.group.split('.') {
            dir.push(segment);
        }
        dir.push(&coordinates.artifact);
        dir
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, raw: &str) -> Result<ResolvedArtifact, ResolutionError> {
        let coordinates = Coordinates::parse(raw)?;
        let artifact_dir = self.artifact_dir(&coordinates);
        let version = match &coordinates.version {
            Some(v) => v.clone(),
            None => newest_version(&artifact_dir).ok_or_else(|| ResolutionError::NoVersion {
                coordinates: raw.to_string(),
                root: artifact_dir.clone(),
            })?,
        };

        let base = format!("{}-{version}", coordinates.artifact);
        let version_dir = artifact_dir.join(&version);
        let jar = version_dir.join(format!("{base}.jar"));
        if !jar.is_file() {
            return Err(ResolutionError::NotFound {
                coordinates: raw.to_string(),
                path: jar,
            });
        }
        debug!(coordinates = raw, jar = %jar.display(), "resolved artifact");
        let source_url = std::fs::read_to_string(version_dir.join(format!("{base}.pom")))
            .ok()
            .and_then(|pom| pom_url(&pom));
        Ok(ResolvedArtifact {
            paths: vec![jar],
            source_url,
        })
    }
}

fn newest_version(artifact_dir: &Path) -> Option<String> {
    std::fs::read_dir(artifact_dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .max_by(|a, b| compare_versions(a, b))
}

/// Orders `1.10.0` after `1.9.2` and a release after its `-SNAPSHOT`/`-rc` builds.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(['.', '-', '_'])
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));
    for i in 0..left.len().max(right.len()) {
        let ordering = match (left.get(i), right.get(i)) {
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Greater,
                (Err(_), Ok(_)) => Ordering::Less,
                (Err(_), Err(_)) => x.cmp(y),
            },
            // A trailing qualifier marks a pre-release; trailing numbers a later patch.
            (Some(x), None) => {
                if x.parse::<u64>().is_ok() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (None, Some(y)) => {
                if y.parse::<u64>().is_ok() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Project URL from a POM, preferring the SCM location.
fn pom_url(pom: &str) -> Option<String> {
    let scm = pom
        .find("<scm>")
        .and_then(|start| pom[start..].find("</scm>").map(|end| &pom[start..start + end]))
        .and_then(tag_text);
    // The first <url> outside <scm> is normally the project URL.
    scm.or_else(|| tag_text(pom))
}

fn tag_text(xml: &str) -> Option<String> {
    let start = xml.find("<url>")? + "<url>".len();
    let end = xml[start..].find("</url>")?;
    let url = xml[start..start + end].trim();
    (!url.is_empty()).then(|| url.to_string())
}
