//! Sandboxed verification of candidate `solution` functions.
//!
//! A request is turned into one Python harness per test case, each harness
//! runs in a throwaway Docker container, and the printed result is compared
//! against the expectation with the type registry from `sandcheck-common`.

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod output;
pub mod sandbox;
pub mod submission;


pub use config::SandboxConfig;
pub use engine::DockerEngine;
pub use executor::Verifier;
pub use sandbox::{SandboxBackend, SandboxError, SandboxOutput};
pub use submission::{ProblemRepository, SolutionRepository, SubmissionError, SubmissionService};
