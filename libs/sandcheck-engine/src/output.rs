// Output parsing: separates console diagnostics from the result payload line

use crate::harness::RESULT_MARKER;
use serde_json::Value;

pub const NO_CONSOLE_OUTPUT: &str = "No console output";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub console_output: String,
    /// Text after the marker on the first marker line, `None` if no such line.
    pub payload_raw: Option<String>,
}

impl ParsedOutput {
    /// Decoded payload. Non-JSON payloads fall back to the raw string, and so
    /// do integers too wide for `i64`/`u64`, which would otherwise lose digits
    /// as `f64`.
    pub fn payload(&self) -> Option<Value> {
        self.payload_raw.as_deref().map(|raw| match serde_json::from_str(raw) {
            Ok(Value::Number(n)) if !n.is_i64() && !n.is_u64() && is_integer_literal(raw) => {
                Value::String(raw.to_string())
            }
            Ok(value) => value,
            Err(_) => Value::String(raw.to_string()),
        })
    }
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Split captured output into console lines and the result payload.
///
/// Only the first marker line is taken as the payload; later ones are
/// treated as console output.
pub fn parse_output(raw: &str) -> ParsedOutput {
    let mut console = Vec::new();
    let mut payload_raw = None;

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match line.strip_prefix(RESULT_MARKER) {
            Some(rest) if payload_raw.is_none() => payload_raw = Some(rest.trim().to_string()),
            _ => console.push(line),
        }
    }

    let console_output = console.join("\n").trim().to_string();
    let console_output = if console_output.is_empty() {
        NO_CONSOLE_OUTPUT.to_string()
    } else {
        console_output
    };

    ParsedOutput {
        console_output,
        payload_raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload_and_console() {
        let raw = "debug 1\ndebug 2\n__SANDCHECK_RESULT__:5\n";
        let parsed = parse_output(raw);

        assert_eq!(parsed.console_output, "debug 1\ndebug 2");
        assert_eq!(parsed.payload_raw.as_deref(), Some("5"));
        assert_eq!(parsed.payload(), Some(json!(5)));
    }

    #[test]
    fn test_parse_without_console() {
        let parsed = parse_output("__SANDCHECK_RESULT__:{\"x\": 1}\n");
        assert_eq!(parsed.console_output, NO_CONSOLE_OUTPUT);
        assert_eq!(parsed.payload(), Some(json!({"x": 1})));
    }

    #[test]
    fn test_parse_without_marker() {
        let parsed = parse_output("Traceback (most recent call last):\nValueError: bad\n");
        assert_eq!(parsed.payload_raw, None);
        assert_eq!(parsed.payload(), None);
        assert!(parsed.console_output.contains("ValueError"));
    }

    #[test]
    fn test_parse_non_json_payload_falls_back_to_string() {
        let parsed = parse_output("__SANDCHECK_RESULT__:not-json\n");
        assert_eq!(parsed.payload(), Some(json!("not-json")));
    }

    #[test]
    fn test_parse_big_int_keeps_every_digit() {
        let parsed = parse_output("__SANDCHECK_RESULT__:1180591620717411303425\n");
        assert_eq!(parsed.payload(), Some(json!("1180591620717411303425")));

        let parsed = parse_output("__SANDCHECK_RESULT__:-9223372036854775808\n");
        assert_eq!(parsed.payload(), Some(json!(i64::MIN)));

        let parsed = parse_output("__SANDCHECK_RESULT__:1e30\n");
        assert_eq!(parsed.payload(), Some(json!(1e30)));
    }

    #[test]
    fn test_parse_unterminated_console_before_marker() {
        // The harness starts the marker on a fresh line after flushing.
        let parsed = parse_output("progress\n__SANDCHECK_RESULT__:5\n");
        assert_eq!(parsed.console_output, "progress");
        assert_eq!(parsed.payload(), Some(json!(5)));
    }

    #[test]
    fn test_parse_first_marker_wins() {
        let parsed = parse_output("__SANDCHECK_RESULT__:1\n__SANDCHECK_RESULT__:2\n");
        assert_eq!(parsed.payload(), Some(json!(1)));
        assert_eq!(parsed.console_output, "__SANDCHECK_RESULT__:2");
    }

    #[test]
    fn test_parse_crlf_and_null_payload() {
        let parsed = parse_output("hello\r\n__SANDCHECK_RESULT__:null\r\n");
        assert_eq!(parsed.console_output, "hello");
        assert_eq!(parsed.payload(), Some(Value::Null));
    }

    #[test]
    fn test_parse_empty_output() {
        let parsed = parse_output("");
        assert_eq!(parsed.console_output, NO_CONSOLE_OUTPUT);
        assert_eq!(parsed.payload(), None);
    }
}
