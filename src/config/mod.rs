//! Per-kind configuration contracts and the validator that enforces them.

pub mod registry;
pub mod requirement;
pub mod validator;

pub use registry::{RequirementRegistry, StaticRegistry};
pub use requirement::{ConfigRequirement, Expected, FieldPredicate, FieldType, parse_example};
pub use validator::{ConfigValidator, FieldIssue};
