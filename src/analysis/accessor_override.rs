use super::Analysis;
use crate::bytecode::{Dispatch, Instruction, ValueKind};
use crate::error::AnalysisError;
use crate::report::{Finding, Reporter};
use crate::repository::TypeRepository;
use crate::universe::{ClassEntity, MethodEntity};

const GROOVY_CALL_SITES: &str = "$getCallSiteArray";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Getter,
    Setter,
}

impl AccessorKind {
    fn label(self) -> &'static str {
        match self {
            Self::Getter => "getter",
            Self::Setter => "setter",
        }
    }

    /// Bean accessor naming: `getX()`/`isX()` returning a value, `setX(v)` returning nothing.
    pub fn matches(self, method: &MethodEntity) -> bool {
        let signature = &method.signature;
        match self {
            Self::Getter => {
                signature.parameters.is_empty()
                    && ((has_property_prefix(&method.name, "get") && !signature.return_type.is_void())
                        || (has_property_prefix(&method.name, "is")
                            && signature.return_type.is_boolean()))
            }
            Self::Setter => {
                has_property_prefix(&method.name, "set")
                    && signature.parameters.len() == 1
                    && signature.return_type.is_void()
            }
        }
    }
}

fn has_property_prefix(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn is_candidate(kind: AccessorKind, method: &MethodEntity) -> bool {
    let access = method.access;
    (access.is_public() || access.is_protected())
        && !access.is_static()
        && !access.is_bridge()
        && !access.is_synthetic()
        && kind.matches(method)
}

/// Shared walk for both accessor checks.
fn visit_accessors(
    kind: AccessorKind,
    class: &ClassEntity,
    repository: &TypeRepository,
    reporter: &mut Reporter,
) -> Result<(), AnalysisError> {
    let universe = repository.universe();
    let id = universe
        .id_of(&class.name)
        .ok_or_else(|| AnalysisError::Unexpected(format!("{} is not loaded", class.name)))?;

    for method in class.methods.iter().filter(|m| is_candidate(kind, m)) {
        let overridden = universe
            .superclasses(id)
            .map(|ancestor| universe.class(ancestor))
            .filter(|ancestor| repository.origin(&ancestor.name).is_host_api())
            .find_map(|ancestor| ancestor.declared_method_like(method));
        let Some(overridden) = overridden else {
            continue;
        };

        let subject = format!(
            "The {} `{}` in `{}` overrides Gradle API from `{}`",
            kind.label(),
            method.display_signature(),
            class.name,
            overridden.owner
        );
        match classify_body(method) {
            Ok(body) => reporter.report(body.finding(subject)),
            Err(error) => {
                reporter.analysis_failed(&format!("{}.{}", class.name, method.display_signature()), &error)
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Abstract,
    SuperOnly,
    DynamicGroovy,
    Custom,
}

impl Body {
    fn finding(self, subject: String) -> Finding {
        match self {
            Self::Abstract => Finding::info(format!("{subject} and redeclares it as abstract")),
            Self::SuperOnly => Finding::info(format!("{subject}, but calls only super()")),
            Self::DynamicGroovy => Finding::warn(format!("Dynamic Groovy: {subject}")),
            Self::Custom => Finding::warn(format!("{subject} with custom logic")),
        }
    }
}

fn classify_body(method: &MethodEntity) -> Result<Body, AnalysisError> {
    if method.access.is_abstract() {
        return Ok(Body::Abstract);
    }
    let Some(code) = method.code.as_deref() else {
        return Err(AnalysisError::MissingCode {
            method: method.display_signature(),
        });
    };
    if let Some(Instruction::Invoke {
        dispatch: Dispatch::Static,
        name,
        ..
    }) = code.first()
        && name == GROOVY_CALL_SITES
    {
        return Ok(Body::DynamicGroovy);
    }
    if delegates_to_super(method, code) {
        Ok(Body::SuperOnly)
    } else {
        Ok(Body::Custom)
    }
}

/// `aload_0; <load each parameter>; invokespecial super.same(..); return`
fn delegates_to_super(method: &MethodEntity, code: &[Instruction]) -> bool {
    let parameters = method.signature.parameters.len();
    if code.len() != parameters + 3 {
        return false;
    }
    let receiver = matches!(
        code[0],
        Instruction::Load {
            local: 0,
            kind: ValueKind::Reference
        }
    );
    let arguments = code[1..=parameters]
        .iter()
        .all(|i| matches!(i, Instruction::Load { .. }));
    let call = matches!(
        &code[parameters + 1],
        Instruction::Invoke { dispatch: Dispatch::Special, name, descriptor, .. }
            if *name == method.name && *descriptor == method.descriptor
    );
    let ret = matches!(code[parameters + 2], Instruction::Return { .. });
    receiver && arguments && call && ret
}

/// Flags public host-API getters re-implemented by plugin types.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeShouldNotOverrideGetter;

impl Analysis for TypeShouldNotOverrideGetter {
    fn name(&self) -> &'static str {
        "type-should-not-override-getter"
    }

    fn visit(
        &self,
        class: &ClassEntity,
        repository: &TypeRepository,
        reporter: &mut Reporter,
    ) -> Result<(), AnalysisError> {
        visit_accessors(AccessorKind::Getter, class, repository, reporter)
    }
}

/// Flags host-API setters re-implemented by plugin types.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeShouldNotOverrideSetter;

impl Analysis for TypeShouldNotOverrideSetter {
    fn name(&self) -> &'static str {
        "type-should-not-override-setter"
    }

    fn visit(
        &self,
        class: &ClassEntity,
        repository: &TypeRepository,
        reporter: &mut Reporter,
    ) -> Result<(), AnalysisError> {
        visit_accessors(AccessorKind::Setter, class, repository, reporter)
    }
}
