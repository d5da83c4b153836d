//! Runs analyses over type sets and assembles the artifact report.

use tracing::{debug, info};

use crate::analysis::{
    Analysis, ShouldNotReferenceInternalApi, TypeShouldExtendType, TypeShouldNotOverrideGetter,
    TypeShouldNotOverrideSetter,
};
use crate::descriptor::simple_class_name;
use crate::report::{ArtifactIdentity, ArtifactReport, FindingGroup, Level, Reporter};
use crate::repository::{TypeRepository, TypeSetKind};

pub const OVERRIDE_SETTER_TITLE: &str = "Should not override setter";
pub const OVERRIDE_GETTER_TITLE: &str = "Should not override getter";
pub const INTERNAL_API_TITLE: &str = "Should not reference internal API";

pub fn extend_type_title(required_superclass: &str) -> String {
    format!("Task should extend {}", simple_class_name(required_superclass))
}

pub struct Analyzer<'r> {
    repository: &'r TypeRepository,
    minimum_level: Level,
    groups: Vec<FindingGroup>,
}

impl<'r> Analyzer<'r> {
    pub fn new(repository: &'r TypeRepository, minimum_level: Level) -> Self {
        Self {
            repository,
            minimum_level,
            groups: Vec::new(),
        }
    }

    /// Runs `analysis` on every member of the `kind` type set. A group is
    /// recorded only if at least one finding survives the level filter.
    pub fn analyze(&mut self, title: &str, kind: TypeSetKind, analysis: &dyn Analysis) {
        let set = self.repository.type_set(kind);
        debug!(analysis = analysis.name(), ?kind, types = set.len(), "running analysis");
        let mut reporter = Reporter::new(self.minimum_level);
        for class in self.repository.members(&set) {
            if let Err(error) = analysis.visit(class, self.repository, &mut reporter) {
                reporter.analysis_failed(&class.name, &error);
            }
        }
        let findings = reporter.into_findings();
        if !findings.is_empty() {
            info!(title, findings = findings.len(), "analysis reported findings");
            self.groups.push(FindingGroup {
                title: title.to_string(),
                findings,
            });
        }
    }

    /// The standard checks, in their fixed order.
    pub fn run_standard_checks(&mut self, required_superclass: &str) {
        self.analyze(
            &extend_type_title(required_superclass),
            TypeSetKind::ExternalTaskTypes,
            &TypeShouldExtendType::new(required_superclass),
        );
        self.analyze(
            OVERRIDE_SETTER_TITLE,
            TypeSetKind::AllExternalReferencedTypes,
            &TypeShouldNotOverrideSetter,
        );
        self.analyze(
            OVERRIDE_GETTER_TITLE,
            TypeSetKind::AllExternalReferencedTypes,
            &TypeShouldNotOverrideGetter,
        );
        self.analyze(
            INTERNAL_API_TITLE,
            TypeSetKind::AllExternalReferencedTypes,
            &ShouldNotReferenceInternalApi,
        );
    }

    pub fn finish(self, artifact: ArtifactIdentity) -> ArtifactReport {
        ArtifactReport::new(artifact, self.groups)
    }
}
