//! Shared data model for sandcheck: problem signatures, test cases, verdicts
//! and the type registry used to coerce and compare loosely-typed values.

pub mod registry;
pub mod signature;
pub mod types;

pub use types::{
    BatchResult, ExecutionRequest, ProblemDefinition, TestCase, TestCaseResult, TypeTag,
    TypedParameter,
};
