use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Declared type of a parameter or of a return value.
///
/// Closed set. Unknown names parse to `Str`, whose coercion is a pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
    List,
    Dict,
    None,
}

impl TypeTag {
    pub const ALL: [TypeTag; 7] = [
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::Str,
        TypeTag::Bool,
        TypeTag::List,
        TypeTag::Dict,
        TypeTag::None,
    ];

    /// Strict lookup, `None` for names outside the registry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "int" | "integer" => Some(TypeTag::Int),
            "float" => Some(TypeTag::Float),
            "str" | "string" => Some(TypeTag::Str),
            "bool" | "boolean" => Some(TypeTag::Bool),
            "list" => Some(TypeTag::List),
            "dict" => Some(TypeTag::Dict),
            "none" | "nonetype" => Some(TypeTag::None),
            _ => None,
        }
    }

    /// Lenient lookup used when decoding requests.
    pub fn parse(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            tracing::debug!(tag = name, "Unknown type tag, falling back to str");
            TypeTag::Str
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Bool => "bool",
            TypeTag::List => "list",
            TypeTag::Dict => "dict",
            TypeTag::None => "none",
        }
    }

    /// Spelling used in generated Python annotations.
    pub fn python_annotation(&self) -> &'static str {
        match self {
            TypeTag::None => "None",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TypeTag {
    fn from(value: String) -> Self {
        TypeTag::parse(&value)
    }
}

impl From<TypeTag> for String {
    fn from(value: TypeTag) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

impl TypedParameter {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }
}

/// One test case as authored. Values are loosely typed and are only coerced
/// on working copies at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub expected: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    #[serde(default)]
    pub parameters: Vec<TypedParameter>,
    pub return_type: TypeTag,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// A stored problem as handed over by the problem repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parameters: Vec<TypedParameter>,
    pub return_type: TypeTag,
    #[serde(default)]
    pub reference_solution: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl ProblemDefinition {
    pub fn request_for(&self, source: impl Into<String>) -> ExecutionRequest {
        ExecutionRequest {
            source: source.into(),
            parameters: self.parameters.clone(),
            return_type: self.return_type,
            test_cases: self.test_cases.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestCaseResult {
    Passed {
        input: Map<String, Value>,
        expected: Value,
        actual: Option<Value>,
        console_output: String,
    },
    Failed {
        input: Map<String, Value>,
        expected: Value,
        actual: Option<Value>,
        console_output: String,
    },
    Errored {
        input: Map<String, Value>,
        expected: Value,
        error_message: String,
    },
}

impl TestCaseResult {
    pub fn errored(test_case: &TestCase, error_message: impl Into<String>) -> Self {
        TestCaseResult::Errored {
            input: test_case.input.clone(),
            expected: test_case.expected.clone(),
            error_message: error_message.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, TestCaseResult::Passed { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, TestCaseResult::Errored { .. })
    }

    pub fn verdict(&self) -> &'static str {
        match self {
            TestCaseResult::Passed { .. } => "passed",
            TestCaseResult::Failed { .. } => "failed",
            TestCaseResult::Errored { .. } => "errored",
        }
    }

    pub fn input(&self) -> &Map<String, Value> {
        match self {
            TestCaseResult::Passed { input, .. }
            | TestCaseResult::Failed { input, .. }
            | TestCaseResult::Errored { input, .. } => input,
        }
    }

    pub fn expected(&self) -> &Value {
        match self {
            TestCaseResult::Passed { expected, .. }
            | TestCaseResult::Failed { expected, .. }
            | TestCaseResult::Errored { expected, .. } => expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<TestCaseResult>,
    pub all_passed: bool,
}

impl BatchResult {
    /// `all_passed` holds only when every submitted case produced a `Passed`
    /// entry. An empty batch never passes.
    pub fn from_results(results: Vec<TestCaseResult>, submitted: usize) -> Self {
        let all_passed = submitted > 0
            && results.len() == submitted
            && results.iter().all(TestCaseResult::is_passed);
        Self {
            results,
            all_passed,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }
}
