use tracing::debug;

use super::Analysis;
use crate::error::AnalysisError;
use crate::origin::TypeOrigin;
use crate::report::{Finding, Reporter};
use crate::repository::TypeRepository;
use crate::universe::{ClassEntity, OBJECT};

/// Flags classes whose superclass chain never reaches the required base class.
#[derive(Debug, Clone)]
pub struct TypeShouldExtendType {
    required_superclass: String,
}

impl TypeShouldExtendType {
    pub fn new(required_superclass: impl Into<String>) -> Self {
        Self {
            required_superclass: required_superclass.into(),
        }
    }
}

impl Analysis for TypeShouldExtendType {
    fn name(&self) -> &'static str {
        "type-should-extend-type"
    }

    fn visit(
        &self,
        class: &ClassEntity,
        repository: &TypeRepository,
        reporter: &mut Reporter,
    ) -> Result<(), AnalysisError> {
        if class.is_interface() {
            debug!(class = %class.name, "skipping interface");
            return Ok(());
        }
        let universe = repository.universe();
        let id = universe
            .id_of(&class.name)
            .ok_or_else(|| AnalysisError::Unexpected(format!("{} is not loaded", class.name)))?;

        let mut nearest = None;
        for ancestor in universe.superclasses(id) {
            let name = universe.class(ancestor).name.as_str();
            if name == self.required_superclass {
                return Ok(());
            }
            if nearest.is_none() && repository.origin(name) != TypeOrigin::External {
                nearest = Some(name);
            }
        }

        reporter.report(Finding::error(format!(
            "Type `{}` should extend `{}` instead of `{}`",
            class.name,
            self.required_superclass,
            nearest.unwrap_or(OBJECT)
        )));
        Ok(())
    }
}
