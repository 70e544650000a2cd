// Prometheus metrics for the verification service

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use sandcheck_common::BatchResult;

lazy_static! {
    pub static ref VERIFICATIONS_TOTAL: IntCounter = register_int_counter!(
        "sandcheck_verifications_total",
        "Number of verification batches processed"
    )
    .expect("Failed to register verification counter");
    pub static ref TEST_CASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sandcheck_test_cases_total",
        "Test case verdicts by outcome",
        &["verdict"]
    )
    .expect("Failed to register test case counter");
    pub static ref VERIFICATION_SECONDS: Histogram = register_histogram!(
        "sandcheck_verification_duration_seconds",
        "Wall time of a verification batch",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register duration histogram");
}

pub fn record_batch(batch: &BatchResult, elapsed_secs: f64) {
    VERIFICATIONS_TOTAL.inc();
    VERIFICATION_SECONDS.observe(elapsed_secs);
    for result in &batch.results {
        TEST_CASES_TOTAL.with_label_values(&[result.verdict()]).inc();
    }
}

/// Render the default registry in the text exposition format.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
