use super::Analysis;
use crate::descriptor::TypeDescriptor;
use crate::error::AnalysisError;
use crate::origin::TypeOrigin;
use crate::report::{Finding, Reporter};
use crate::repository::TypeRepository;
use crate::universe::{ClassEntity, ClassId, ReferencedSymbol};

/// Flags every way a plugin type reaches into internal host packages:
/// its supertypes, member declarations, annotations and method bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShouldNotReferenceInternalApi;

impl Analysis for ShouldNotReferenceInternalApi {
    fn name(&self) -> &'static str {
        "should-not-reference-internal-api"
    }

    fn visit(
        &self,
        class: &ClassEntity,
        repository: &TypeRepository,
        reporter: &mut Reporter,
    ) -> Result<(), AnalysisError> {
        let id = repository
            .universe()
            .id_of(&class.name)
            .ok_or_else(|| AnalysisError::Unexpected(format!("{} is not loaded", class.name)))?;
        let check = Check {
            class,
            id,
            repository,
        };
        check.hierarchy(reporter);
        check.members(reporter);
        check.bodies(reporter);
        Ok(())
    }
}

struct Check<'a> {
    class: &'a ClassEntity,
    id: ClassId,
    repository: &'a TypeRepository,
}

impl Check<'_> {
    fn internal(&self, name: &str) -> Option<String> {
        self.repository
            .classifier()
            .internal_match(name)
            .map(|p| p.as_str().to_string())
    }

    fn hierarchy(&self, reporter: &mut Reporter) {
        for supertype in self.class.supertype_names() {
            if let Some(pattern) = self.internal(supertype) {
                reporter.report(Finding::error(format!(
                    "Type `{}` extends internal type `{supertype}` (matches `{pattern}`)",
                    self.class.name
                )));
            }
        }
        self.annotations(&self.class.name, &self.class.annotations, reporter);
    }

    fn members(&self, reporter: &mut Reporter) {
        let universe = self.repository.universe();
        for field in &self.class.fields {
            let subject = format!("{}.{}", self.class.name, field.name);
            if let Some((ty, pattern)) = self.internal_type(&field.field_type) {
                reporter.report(Finding::error(format!(
                    "Field `{subject}` has internal type `{ty}` (matches `{pattern}`)"
                )));
            }
            self.annotations(&subject, &field.annotations, reporter);
        }

        for method in &self.class.methods {
            let subject = format!("{}.{}", self.class.name, method.display_signature());
            let signature = &method.signature;
            let declared = signature
                .parameters
                .iter()
                .chain(std::iter::once(&signature.return_type))
                .filter_map(|ty| self.internal_type(ty))
                .chain(
                    method
                        .exceptions
                        .iter()
                        .filter_map(|e| self.internal(e).map(|p| (e.clone(), p))),
                );
            for (ty, pattern) in declared {
                reporter.report(Finding::error(format!(
                    "Method `{subject}` declares internal type `{ty}` (matches `{pattern}`)"
                )));
            }
            self.annotations(&subject, &method.annotations, reporter);

            // Inherited constructors are covered by the supertype finding.
            if method.is_constructor() || method.access.is_static() {
                continue;
            }
            for supertype in self.class.supertype_names() {
                if self.internal(supertype).is_none() {
                    continue;
                }
                let Some(overridden) =
                    universe.resolve_method(supertype, &method.name, &method.descriptor)
                else {
                    continue;
                };
                if let Some(pattern) = self.internal(&overridden.owner)
                    && !self.has_public_definition(&overridden.owner, &method.name, &method.descriptor)
                {
                    reporter.report(Finding::warn(format!(
                        "Method `{subject}` overrides internal method `{}.{}` (matches `{pattern}`)",
                        overridden.owner,
                        overridden.display_signature()
                    )));
                }
            }
        }
    }

    fn bodies(&self, reporter: &mut Reporter) {
        let universe = self.repository.universe();
        for method in &self.class.methods {
            for symbol in method.referenced_symbols() {
                let target = match symbol {
                    ReferencedSymbol::Method {
                        owner,
                        name,
                        descriptor,
                    } => {
                        let declaring = universe
                            .resolve_method(owner, name, descriptor)
                            .map_or(owner.as_str(), |m| m.owner.as_str());
                        if self.has_public_definition(declaring, name, descriptor) {
                            continue;
                        }
                        ReferencedSymbol::Method {
                            owner: declaring.to_string(),
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                        }
                    }
                    other => other.clone(),
                };
                if let Some(pattern) = self.internal(target.owner()) {
                    reporter.report(Finding::error(format!(
                        "Type `{}` references internal {target} (matches `{pattern}`)",
                        self.class.name
                    )));
                }
            }
        }
    }

    fn annotations(&self, subject: &str, annotations: &[String], reporter: &mut Reporter) {
        for annotation in annotations {
            if let Some(pattern) = self.internal(annotation) {
                reporter.report(Finding::warn(format!(
                    "Annotation on `{subject}` references internal type `{annotation}` (matches `{pattern}`)"
                )));
            }
        }
    }

    fn internal_type(&self, ty: &TypeDescriptor) -> Option<(String, String)> {
        let class = ty.element_class()?;
        self.internal(class).map(|p| (class.to_string(), p))
    }

    /// Whether a public host supertype of `owner` declares the same method,
    /// making the internal owner an implementation detail of a public contract.
    fn has_public_definition(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        let universe = self.repository.universe();
        let Some(owner_id) = universe.id_of(owner) else {
            return false;
        };
        if owner_id == self.id {
            return false;
        }
        universe.supertypes(owner_id).into_iter().any(|id| {
            let supertype = universe.class(id);
            self.repository.origin(&supertype.name) == TypeOrigin::Public
                && supertype.declared_method(name, descriptor).is_some()
        })
    }
}
