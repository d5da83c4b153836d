//! Merging of per-artifact reports into one document.
//!
//! Artifacts that produced exactly the same findings share a section. The key
//! is a canonical form of the report (groups sorted by title plus the failure
//! reason), held in ordered maps so grouping never depends on hashing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::report::{ArtifactIdentity, ArtifactReport, FindingGroup};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub artifacts: Vec<ArtifactIdentity>,
    pub groups: Vec<FindingGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ReportSection {
    pub fn is_clean(&self) -> bool {
        self.failure.is_none() && self.groups.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub sections: Vec<ReportSection>,
}

impl AggregateReport {
    pub fn artifact_count(&self) -> usize {
        self.sections.iter().map(|s| s.artifacts.len()).sum()
    }

    pub fn clean(&self) -> impl Iterator<Item = &ReportSection> {
        self.sections.iter().filter(|s| s.is_clean())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportSection> {
        self.sections.iter().filter(|s| s.is_failed())
    }

    pub fn with_findings(&self) -> impl Iterator<Item = &ReportSection> {
        self.sections
            .iter()
            .filter(|s| !s.is_clean() && !s.is_failed())
    }
}

type ContentKey = (Option<String>, Vec<FindingGroup>);

/// Groups reports with identical content. Sections appear in the order their
/// first artifact was encountered.
pub fn aggregate(reports: impl IntoIterator<Item = ArtifactReport>) -> AggregateReport {
    let mut index: BTreeMap<ContentKey, usize> = BTreeMap::new();
    let mut sections: Vec<ReportSection> = Vec::new();
    for report in reports {
        let mut sorted = report.groups.clone();
        sorted.sort_by(|a, b| a.title.cmp(&b.title));
        let key = (report.failure.clone(), sorted);
        match index.get(&key) {
            Some(&position) => sections[position].artifacts.push(report.artifact),
            None => {
                index.insert(key, sections.len());
                sections.push(ReportSection {
                    artifacts: vec![report.artifact],
                    failure: report.failure,
                    groups: report.groups,
                });
            }
        }
    }
    AggregateReport { sections }
}
