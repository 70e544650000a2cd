/// Result Comparator - Type-Aware Verdicts
///
/// **Core Responsibility:**
/// Compare the decoded result payload of one run against the expected value
/// under the declared return type.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about harness generation
/// - Pure function: (actual, expected, return type) -> verdict
/// - Deterministic: objects are key-ordered, so no verdict depends on
///   iteration order
///
/// **Comparison Rules:**
/// - Both sides are coerced through the type registry for the return type
/// - A run with no result line never passes, whatever the return type
/// - `none` accepts only null-like forms (`null`, `""`, `None`) on both sides;
///   other expected strings are not JSON-decoded first and cannot match

use crate::output::ParsedOutput;
use sandcheck_common::{TestCase, TestCaseResult, TypeTag};
use serde_json::Value;

/// Outcome of comparing one actual value against the expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub passed: bool,
    /// Coerced actual value, `None` when no payload was produced.
    pub actual: Option<Value>,
}

pub fn compare(actual: Option<&Value>, expected: &Value, return_type: TypeTag) -> Comparison {
    match actual {
        Some(actual) => {
            let coerced = return_type.coerce(actual);
            Comparison {
                passed: return_type.equal(&coerced, expected),
                actual: Some(coerced),
            }
        }
        None => Comparison {
            passed: false,
            actual: None,
        },
    }
}

/// Turn a parsed sandbox run into the verdict for its test case.
pub fn evaluate_test(test_case: &TestCase, parsed: &ParsedOutput, return_type: TypeTag) -> TestCaseResult {
    let payload = parsed.payload();
    let comparison = compare(payload.as_ref(), &test_case.expected, return_type);

    let input = test_case.input.clone();
    let expected = test_case.expected.clone();
    let console_output = parsed.console_output.clone();

    if comparison.passed {
        TestCaseResult::Passed {
            input,
            expected,
            actual: comparison.actual,
            console_output,
        }
    } else {
        TestCaseResult::Failed {
            input,
            expected,
            actual: comparison.actual,
            console_output,
        }
    }
}
