/// Harness Generator - wraps candidate source into a runnable Python script
///
/// **Layout of a generated harness:**
/// 1. Preamble (imports and the result encoder)
/// 2. Candidate source, verbatim
/// 3. Argument mapping as a Python literal
/// 4. Call of the entry point with keyword arguments
/// 5. One marker-prefixed line carrying the JSON-encoded result
///
/// Literal rendering lives in `to_python_literal` so it can be tested on its
/// own. JSON text is not a Python literal (`true`, `null`), which is why
/// values are never interpolated directly.

use sandcheck_common::signature::{validate_parameters, SignatureError, ENTRY_POINT};
use sandcheck_common::{TestCase, TypedParameter};
use serde_json::{Map, Value};
use thiserror::Error;

/// Prefix of the single stdout line that carries the result payload.
pub const RESULT_MARKER: &str = "__SANDCHECK_RESULT__:";

const PREAMBLE: &str = r#"import json
import sys


def __sandcheck_encode(value):
    if isinstance(value, (set, frozenset)):
        return sorted(value, key=repr)
    return repr(value)
"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Invalid parameter list: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("Missing value for parameter '{0}'")]
    MissingArgument(String),
    #[error("Input contains '{0}' which is not a declared parameter")]
    UnexpectedArgument(String),
}

/// Render a JSON value as a Python expression that evaluates to the same data.
pub fn to_python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_string(s),
        Value::Array(items) => {
            let items = items.iter().map(to_python_literal).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries = map
                .iter()
                .map(|(k, v)| format!("{}: {}", python_string(k), to_python_literal(v)))
                .collect::<Vec<_>>();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

// JSON string escapes (\" \\ \n \uXXXX) are all valid in Python string literals.
fn python_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Coerce one test case's raw input into typed call arguments.
///
/// Arguments come back in declaration order; the test case is left untouched.
pub fn build_arguments(
    parameters: &[TypedParameter],
    test_case: &TestCase,
) -> Result<Map<String, Value>, GenerationError> {
    validate_parameters(parameters)?;

    if let Some(unknown) = test_case
        .input
        .keys()
        .find(|key| !parameters.iter().any(|p| &p.name == *key))
    {
        return Err(GenerationError::UnexpectedArgument(unknown.clone()));
    }

    let mut arguments = Map::new();
    for param in parameters {
        let raw = test_case
            .input
            .get(&param.name)
            .ok_or_else(|| GenerationError::MissingArgument(param.name.clone()))?;
        arguments.insert(param.name.clone(), param.type_tag.coerce(raw));
    }

    Ok(arguments)
}

/// Produce the complete harness text for one test case.
pub fn build_harness(
    source: &str,
    parameters: &[TypedParameter],
    test_case: &TestCase,
) -> Result<String, GenerationError> {
    let arguments = build_arguments(parameters, test_case)?;

    let mut harness = String::with_capacity(PREAMBLE.len() + source.len() + 256);
    harness.push_str(PREAMBLE);
    harness.push_str("\n\n");
    harness.push_str(source);
    if !source.ends_with('\n') {
        harness.push('\n');
    }
    harness.push_str("\n\n");
    harness.push_str(&format!(
        "__sandcheck_args = {}\n",
        to_python_literal(&Value::Object(arguments))
    ));
    harness.push_str(&format!(
        "__sandcheck_result = {}(**__sandcheck_args)\n",
        ENTRY_POINT
    ));
    // Candidate output may lack a trailing newline; the marker must start its own line.
    harness.push_str("sys.stdout.flush()\n");
    harness.push_str("sys.stderr.flush()\n");
    harness.push_str(&format!(
        "print(\"\\n\" + {} + json.dumps(__sandcheck_result, default=__sandcheck_encode), flush=True)\n",
        python_string(RESULT_MARKER)
    ));

    Ok(harness)
}
