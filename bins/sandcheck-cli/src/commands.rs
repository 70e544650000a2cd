// CLI commands for running sandcheck locally
use anyhow::{Context, Result};
use sandcheck_common::signature::{render_header, wrap_body};
use sandcheck_common::{BatchResult, ProblemDefinition, TestCaseResult};
use sandcheck_engine::{DockerEngine, SandboxConfig, Verifier};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 40;

#[derive(Debug, Default)]
pub struct VerifyOptions {
    pub wrap_body: bool,
    pub json: bool,
    pub timeout_ms: Option<u64>,
    pub parallel: Option<usize>,
}

/// Load a problem definition file
pub fn load_problem(path: &Path) -> Result<ProblemDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse problem file {}", path.display()))
}

fn sandbox_config(options: &VerifyOptions) -> Result<SandboxConfig> {
    let mut config = SandboxConfig::load_default()?;
    if let Some(timeout_ms) = options.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(parallel) = options.parallel {
        config.max_parallel_tests = parallel;
    }
    config.validate()?;
    Ok(config)
}

/// Verify a solution file; returns whether every test case passed
pub async fn verify(problem_path: &Path, source_path: &Path, options: &VerifyOptions) -> Result<bool> {
    let problem = load_problem(problem_path)?;
    let mut source = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read source file {}", source_path.display()))?;

    if options.wrap_body {
        source = wrap_body(&source, &problem.parameters, problem.return_type)?;
    }

    let engine = DockerEngine::new(sandbox_config(options)?).context("Failed to connect to Docker")?;
    let max_parallel_tests = engine.config().max_parallel_tests;
    let verifier = Verifier::with_concurrency(Arc::new(engine), max_parallel_tests);

    if !options.json {
        println!("🔍 Verifying '{}' ({} test cases)", problem.title, problem.test_cases.len());
    }

    let batch = verifier.verify(&problem.request_for(source)).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        print!("{}", render_report(&batch));
    }

    Ok(batch.all_passed)
}

/// Print the function header for a problem
pub fn signature(problem_path: &Path) -> Result<()> {
    let problem = load_problem(problem_path)?;
    let header = render_header(&problem.parameters, problem.return_type)?;
    println!("{}", header);
    Ok(())
}

/// Remove leftover sandbox containers
pub async fn reap() -> Result<()> {
    let engine = DockerEngine::new(SandboxConfig::load_default()?)
        .context("Failed to connect to Docker")?;
    let removed = engine.reap_orphans().await?;
    println!("🧹 Removed {} sandbox container(s)", removed);
    Ok(())
}

fn preview(text: &str) -> String {
    let single_line = text.replace('\n', "\\n");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let cut: String = single_line.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{}...", cut)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human-readable report: one block per test case plus a summary line
pub fn render_report(batch: &BatchResult) -> String {
    let mut report = String::new();

    for (index, result) in batch.results.iter().enumerate() {
        let marker = match result {
            TestCaseResult::Passed { .. } => "✅",
            TestCaseResult::Failed { .. } => "❌",
            TestCaseResult::Errored { .. } => "💥",
        };
        report.push_str(&format!(
            "{} Test {} [{}]\n",
            marker,
            index + 1,
            result.verdict()
        ));
        report.push_str(&format!(
            "   input:    {}\n",
            preview(&Value::Object(result.input().clone()).to_string())
        ));
        report.push_str(&format!("   expected: {}\n", preview(&value_text(result.expected()))));

        match result {
            TestCaseResult::Passed { actual, console_output, .. }
            | TestCaseResult::Failed { actual, console_output, .. } => {
                let actual = actual
                    .as_ref()
                    .map(value_text)
                    .unwrap_or_else(|| "<no result>".to_string());
                report.push_str(&format!("   actual:   {}\n", preview(&actual)));
                report.push_str(&format!("   console:  {}\n", preview(console_output)));
            }
            TestCaseResult::Errored { error_message, .. } => {
                report.push_str(&format!("   error:    {}\n", preview(error_message)));
            }
        }
    }

    report.push_str(&format!(
        "\n{} {}/{} passed\n",
        if batch.all_passed { "🎉" } else { "⚠️" },
        batch.passed_count(),
        batch.results.len()
    ));
    report
}
