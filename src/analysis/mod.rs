//! The checks run against each artifact.
//!
//! Every check implements [`Analysis`]: it looks at one class at a time and
//! streams findings into a [`Reporter`]. Checks never see each other's output.

mod accessor_override;
mod extend_type;
mod internal_api;

pub use accessor_override::{AccessorKind, TypeShouldNotOverrideGetter, TypeShouldNotOverrideSetter};
pub use extend_type::TypeShouldExtendType;
pub use internal_api::ShouldNotReferenceInternalApi;

use crate::error::AnalysisError;
use crate::report::Reporter;
use crate::repository::TypeRepository;
use crate::universe::ClassEntity;

pub trait Analysis {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn visit(
        &self,
        class: &ClassEntity,
        repository: &TypeRepository,
        reporter: &mut Reporter,
    ) -> Result<(), AnalysisError>;
}
