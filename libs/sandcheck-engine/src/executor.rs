/// Batch Orchestrator - High-Level Verification
///
/// **Responsibility:**
/// Drive every test case of a request through harness generation, sandbox
/// execution, output parsing and comparison, and aggregate the verdicts.
///
/// **Architecture:**
/// 1. Generate a harness per test case (harness.rs)
/// 2. Run it through the injected `SandboxBackend` (engine.rs for Docker)
/// 3. Split console output from the result line (output.rs)
/// 4. Compare against the expectation (evaluator.rs)
///
/// **Guarantees:**
/// - Exactly one result per test case, in test-case order
/// - A failure in one case becomes an `Errored` entry and never stops the batch
/// - No state survives between calls; the backend handle is the only shared part

use crate::evaluator;
use crate::harness;
use crate::output;
use crate::sandbox::SandboxBackend;
use futures_util::stream::{self, StreamExt};
use sandcheck_common::{BatchResult, ExecutionRequest, TestCase, TestCaseResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Verifier {
    backend: Arc<dyn SandboxBackend>,
    max_parallel_tests: usize,
}

impl Verifier {
    /// Sequential verifier, the reference behavior.
    pub fn new(backend: Arc<dyn SandboxBackend>) -> Self {
        Self::with_concurrency(backend, 1)
    }

    /// Verifier that runs up to `max_parallel_tests` sandboxes at once.
    /// Results are still reported in test-case order.
    pub fn with_concurrency(backend: Arc<dyn SandboxBackend>, max_parallel_tests: usize) -> Self {
        Self {
            backend,
            max_parallel_tests: max_parallel_tests.max(1),
        }
    }

    /// Verify a candidate against every test case of the request.
    #[tracing::instrument(
        skip(self, request),
        fields(
            test_count = request.test_cases.len(),
            return_type = %request.return_type,
            source_size = request.source.len()
        )
    )]
    pub async fn verify(&self, request: &ExecutionRequest) -> BatchResult {
        let start = Instant::now();
        let submitted = request.test_cases.len();

        info!(
            parallelism = self.max_parallel_tests,
            "Starting verification batch"
        );

        // `buffered` yields in input order regardless of completion order.
        // Futures are built eagerly (but not polled) so the stream has a
        // concrete item type; this avoids a higher-ranked lifetime error when
        // the future must be `Send`.
        let cases: Vec<_> = request
            .test_cases
            .iter()
            .enumerate()
            .map(|(index, test_case)| self.run_case(request, index, test_case))
            .collect();
        let results: Vec<TestCaseResult> = stream::iter(cases)
            .buffered(self.max_parallel_tests)
            .collect()
            .await;

        let batch = BatchResult::from_results(results, submitted);

        info!(
            passed = batch.passed_count(),
            total = submitted,
            all_passed = batch.all_passed,
            execution_ms = start.elapsed().as_millis() as u64,
            "Verification batch completed"
        );

        batch
    }

    #[tracing::instrument(skip(self, request, index, test_case), fields(test_index = index))]
    async fn run_case(&self, request: &ExecutionRequest, index: usize, test_case: &TestCase) -> TestCaseResult {
        let harness = match harness::build_harness(&request.source, &request.parameters, test_case) {
            Ok(harness) => harness,
            Err(e) => {
                warn!(error = %e, "Harness generation failed");
                return TestCaseResult::errored(test_case, e.to_string());
            }
        };

        let run = match self.backend.execute(&harness).await {
            Ok(run) => run,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Sandbox execution failed");
                return TestCaseResult::errored(test_case, e.to_string());
            }
        };

        let parsed = output::parse_output(&run.output);
        if parsed.payload_raw.is_none() {
            warn!("No result line in sandbox output");
        }

        let result = evaluator::evaluate_test(test_case, &parsed, request.return_type);

        debug!(
            verdict = result.verdict(),
            execution_ms = run.execution_time_ms,
            "Test case evaluated"
        );

        result
    }
}
