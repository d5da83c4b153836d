//! Findings and per-artifact reports.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::AnalysisError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown level `{s}`, expected INFO, WARN or ERROR")),
        }
    }
}

/// One diagnostic. Findings order by message first so a group reads
/// alphabetically regardless of the order analyses emitted them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub level: Level,
    pub message: String,
}

impl Finding {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Level::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.message
            .cmp(&other.message)
            .then(self.level.cmp(&other.level))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FindingGroup {
    pub title: String,
    pub findings: BTreeSet<Finding>,
}

impl FindingGroup {
    pub fn highest_level(&self) -> Option<Level> {
        self.findings.iter().map(|f| f.level).max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub coordinates: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ArtifactIdentity {
    pub fn new(coordinates: impl Into<String>) -> Self {
        Self {
            coordinates: coordinates.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }
}

pub const FAILURE_TITLE: &str = "Could not be analyzed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub artifact: ArtifactIdentity,
    pub groups: Vec<FindingGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ArtifactReport {
    pub fn new(artifact: ArtifactIdentity, groups: Vec<FindingGroup>) -> Self {
        Self {
            artifact,
            groups,
            failure: None,
        }
    }

    /// Report for an artifact whose binaries could not be resolved or loaded.
    pub fn failed(artifact: ArtifactIdentity, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let findings = BTreeSet::from([Finding::error(format!("{FAILURE_TITLE}: {reason}"))]);
        Self {
            artifact,
            groups: vec![FindingGroup {
                title: FAILURE_TITLE.to_string(),
                findings,
            }],
            failure: Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.failure.is_none() && self.groups.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.groups.iter().map(|g| g.findings.len()).sum()
    }
}

/// Collects the findings of one analysis run, dropping those below the
/// configured minimum level.
#[derive(Debug)]
pub struct Reporter {
    minimum_level: Level,
    findings: BTreeSet<Finding>,
}

impl Reporter {
    pub fn new(minimum_level: Level) -> Self {
        Self {
            minimum_level,
            findings: BTreeSet::new(),
        }
    }

    pub fn report(&mut self, finding: Finding) {
        if finding.level >= self.minimum_level {
            self.findings.insert(finding);
        }
    }

    /// Downgrades an analysis failure on `subject` to a WARN finding.
    pub fn analysis_failed(&mut self, subject: &str, error: &AnalysisError) {
        warn!(subject, %error, "analysis failed, reporting as a finding");
        self.report(Finding::warn(format!(
            "Could not analyze `{subject}`: {error}"
        )));
    }

    pub fn into_findings(self) -> BTreeSet<Finding> {
        self.findings
    }
}
