// Entry-point signature helpers for problem authoring

use crate::types::{TypeTag, TypedParameter};
use std::collections::HashSet;
use thiserror::Error;

/// Fixed name every candidate must define and the harness always calls.
pub const ENTRY_POINT: &str = "solution";

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Parameter {index} has an empty name")]
    EmptyName { index: usize },
    #[error("Parameter name '{0}' is not a valid identifier")]
    InvalidName(String),
    #[error("Parameter name '{0}' is a reserved word")]
    ReservedName(String),
    #[error("Parameter name '{0}' is declared more than once")]
    DuplicateName(String),
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Check that a parameter list can be turned into a Python signature.
pub fn validate_parameters(parameters: &[TypedParameter]) -> Result<(), SignatureError> {
    let mut seen = HashSet::new();

    for (index, param) in parameters.iter().enumerate() {
        let name = param.name.as_str();
        if name.is_empty() {
            return Err(SignatureError::EmptyName { index });
        }
        if !is_identifier(name) {
            return Err(SignatureError::InvalidName(name.to_string()));
        }
        if PYTHON_KEYWORDS.contains(&name) {
            return Err(SignatureError::ReservedName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(SignatureError::DuplicateName(name.to_string()));
        }
    }

    Ok(())
}

fn signature_line(parameters: &[TypedParameter], return_type: TypeTag) -> String {
    let params = parameters
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_tag.python_annotation()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "def {}({}) -> {}:",
        ENTRY_POINT,
        params,
        return_type.python_annotation()
    )
}

/// Render the stub shown to solvers, e.g.
/// `def solution(a: int, b: int) -> int:` followed by an indented `pass`.
pub fn render_header(
    parameters: &[TypedParameter],
    return_type: TypeTag,
) -> Result<String, SignatureError> {
    validate_parameters(parameters)?;
    Ok(format!("{}\n    pass", signature_line(parameters, return_type)))
}

/// Whether the source defines the entry point at module level.
pub fn defines_entry_point(source: &str) -> bool {
    let prefix = format!("def {}", ENTRY_POINT);
    source.lines().any(|line| {
        line.strip_prefix(&prefix)
            .is_some_and(|rest| rest.trim_start().starts_with('('))
    })
}

/// Turn a bare function body into a complete entry point.
///
/// Source that already defines the entry point is returned unchanged.
pub fn wrap_body(
    source: &str,
    parameters: &[TypedParameter],
    return_type: TypeTag,
) -> Result<String, SignatureError> {
    validate_parameters(parameters)?;

    if defines_entry_point(source) {
        return Ok(source.to_string());
    }

    let mut body = source
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    if body.trim().is_empty() {
        body = "    pass".to_string();
    }

    Ok(format!("{}\n{}\n", signature_line(parameters, return_type), body))
}
