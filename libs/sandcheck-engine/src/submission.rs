//! Run/submit flows on top of the verifier.
//!
//! Problems and solutions are stored elsewhere; this module only defines the
//! seams it needs and the rule that a solution is persisted only after every
//! test case passed.

use crate::executor::Verifier;
use async_trait::async_trait;
use sandcheck_common::{BatchResult, ProblemDefinition};
use thiserror::Error;
use tracing::info;

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    async fn load(&self, problem_id: &str) -> anyhow::Result<Option<ProblemDefinition>>;
}

#[async_trait]
pub trait SolutionRepository: Send + Sync {
    async fn save(&self, problem_id: &str, author: &str, source: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Problem '{0}' not found")]
    ProblemNotFound(String),
    #[error("Failed to load problem '{problem_id}': {source}")]
    ProblemLoad {
        problem_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to save solution for '{problem_id}': {source}")]
    SolutionSave {
        problem_id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub batch: BatchResult,
    pub persisted: bool,
}

pub struct SubmissionService<P, S> {
    verifier: Verifier,
    problems: P,
    solutions: S,
}

impl<P: ProblemRepository, S: SolutionRepository> SubmissionService<P, S> {
    pub fn new(verifier: Verifier, problems: P, solutions: S) -> Self {
        Self {
            verifier,
            problems,
            solutions,
        }
    }

    async fn problem(&self, problem_id: &str) -> Result<ProblemDefinition, SubmissionError> {
        self.problems
            .load(problem_id)
            .await
            .map_err(|source| SubmissionError::ProblemLoad {
                problem_id: problem_id.to_string(),
                source,
            })?
            .ok_or_else(|| SubmissionError::ProblemNotFound(problem_id.to_string()))
    }

    /// Verify without persisting anything.
    pub async fn run(&self, problem_id: &str, source: &str) -> Result<BatchResult, SubmissionError> {
        let problem = self.problem(problem_id).await?;
        Ok(self.verifier.verify(&problem.request_for(source)).await)
    }

    /// Verify and persist the solution only when every test case passed.
    pub async fn submit(
        &self,
        problem_id: &str,
        author: &str,
        source: &str,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let problem = self.problem(problem_id).await?;
        let batch = self.verifier.verify(&problem.request_for(source)).await;

        if !batch.all_passed {
            info!(
                problem_id = problem_id,
                passed = batch.passed_count(),
                total = batch.results.len(),
                "Submission rejected"
            );
            return Ok(SubmissionOutcome {
                batch,
                persisted: false,
            });
        }

        self.solutions
            .save(problem_id, author, source)
            .await
            .map_err(|source| SubmissionError::SolutionSave {
                problem_id: problem_id.to_string(),
                source,
            })?;

        info!(problem_id = problem_id, "Submission accepted and saved");
        Ok(SubmissionOutcome {
            batch,
            persisted: true,
        })
    }
}
