//! Wire protocol of the call bridge
//!
//! Inbound requests arrive as a JSON array `[method, ...args]`. Replies are
//! `[null, value]` on success and `[error]` on failure, where `error` is an
//! [`ErrorDescriptor`] object or any other thrown value passed through as-is.
//!
//! Outbound evaluations are wrapped in a script fragment that reports its
//! settlement back through the `__evalReply` bound function.

use crate::surface::ReturnStatus;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Native binding used for every page → host call
pub const CALL_BINDING: &str = "__call";

/// Bound function receiving outbound evaluation replies
pub const EVAL_REPLY: &str = "__evalReply";

/// Result of one bound function invocation
pub type CallOutcome = Result<Value, Thrown>;

/// Plain description of a script or host error
///
/// Mirrors the fields of a JavaScript `Error` that survive JSON encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
}

impl ErrorDescriptor {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            line: None,
            column: None,
            stack: None,
            cause: None,
        }
    }

    /// A generic `Error`
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Error for a call to a name missing from the function table
    pub fn reference_error(method: &str) -> Self {
        Self::new("ReferenceError", format!("'{}' is not defined", method))
    }

    /// Error for a call that did not settle in time
    pub fn timeout() -> Self {
        Self::new("TimeoutError", "Timeout")
    }

    /// Error for a value that could not be encoded as JSON
    pub fn serialization(error: impl fmt::Display) -> Self {
        Self::new("SerializationError", error.to_string())
    }

    /// Error for arguments that do not match the bound function
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: Value) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Rebuild a descriptor from a reply value sent by page script
    ///
    /// Objects keep whichever descriptor fields they carry; any other value
    /// becomes the message of a plain `Error`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => {
                let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
                Self {
                    name: text("name").unwrap_or_else(|| "Error".to_string()),
                    message: text("message").unwrap_or_default(),
                    line: fields.get("line").and_then(Value::as_u64),
                    column: fields.get("column").and_then(Value::as_u64),
                    stack: text("stack"),
                    cause: fields.get("cause").filter(|cause| !cause.is_null()).cloned(),
                }
            }
            Value::String(message) => Self::error(message.clone()),
            other => Self::error(other.to_string()),
        }
    }

    /// JSON object sent to the page
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(self.name.clone()));
        fields.insert("message".to_string(), Value::String(self.message.clone()));
        if let Some(line) = self.line {
            fields.insert("line".to_string(), Value::from(line));
        }
        if let Some(column) = self.column {
            fields.insert("column".to_string(), Value::from(column));
        }
        if let Some(stack) = &self.stack {
            fields.insert("stack".to_string(), Value::String(stack.clone()));
        }
        if let Some(cause) = &self.cause {
            fields.insert("cause".to_string(), cause.clone());
        }
        Value::Object(fields)
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Failure value of a bound function
#[derive(Debug, Clone, PartialEq)]
pub enum Thrown {
    /// An error, serialized as a descriptor object
    Error(ErrorDescriptor),
    /// Any other value, serialized unchanged
    Value(Value),
}

impl Thrown {
    pub fn to_json(&self) -> Value {
        match self {
            Thrown::Error(descriptor) => descriptor.to_json(),
            Thrown::Value(value) => value.clone(),
        }
    }

    pub fn descriptor(&self) -> Option<&ErrorDescriptor> {
        match self {
            Thrown::Error(descriptor) => Some(descriptor),
            Thrown::Value(_) => None,
        }
    }
}

impl From<ErrorDescriptor> for Thrown {
    fn from(descriptor: ErrorDescriptor) -> Self {
        Thrown::Error(descriptor)
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        Thrown::Value(value)
    }
}

/// Messages become a plain `Error`
impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Thrown::Error(ErrorDescriptor::error(message))
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Thrown::Error(ErrorDescriptor::error(message))
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thrown::Error(descriptor) => write!(f, "{}", descriptor),
            Thrown::Value(value) => write!(f, "{}", value),
        }
    }
}

/// Decoded inbound request
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub method: String,
    pub args: Vec<Value>,
}

/// Decode `[method, ...args]`
pub fn decode_request(raw: &str) -> Result<CallRequest, Thrown> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ErrorDescriptor::new("SyntaxError", e.to_string()))?;

    let Value::Array(mut items) = value else {
        return Err(ErrorDescriptor::type_error("Call request must be an array").into());
    };
    if items.is_empty() {
        return Err(ErrorDescriptor::type_error("Call request is missing a method name").into());
    }

    match items.remove(0) {
        Value::String(method) => Ok(CallRequest {
            method,
            args: items,
        }),
        other => Err(ErrorDescriptor::type_error(format!(
            "Method name must be a string, got {}",
            other
        ))
        .into()),
    }
}

/// Encode a call outcome as a reply payload
///
/// If the payload cannot be encoded the reply is downgraded to a failure
/// carrying the serialization error.
pub fn encode_outcome(outcome: CallOutcome) -> (ReturnStatus, String) {
    let (status, payload) = match outcome {
        Ok(value) => (ReturnStatus::Success, Value::Array(vec![Value::Null, value])),
        Err(thrown) => (ReturnStatus::Failure, Value::Array(vec![thrown.to_json()])),
    };

    match serde_json::to_string(&payload) {
        Ok(encoded) => (status, encoded),
        Err(e) => {
            let fallback = Value::Array(vec![ErrorDescriptor::serialization(e).to_json()]);
            (ReturnStatus::Failure, fallback.to_string())
        }
    }
}

/// JavaScript truthiness of a JSON value
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Script evaluated in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Function body, may use `return` and `await`
    Source(String),
    /// Zero-argument JavaScript function expression
    Function(String),
}

impl Script {
    pub fn source(body: impl Into<String>) -> Self {
        Script::Source(body.into())
    }

    pub fn function(expression: impl Into<String>) -> Self {
        Script::Function(expression.into())
    }

    /// Callable expression for this script
    fn callable(&self) -> String {
        match self {
            // Body on its own lines so a trailing line comment cannot swallow the brace.
            Script::Source(body) => format!("async () => {{\n{}\n}}", body),
            Script::Function(expression) => expression.clone(),
        }
    }
}

impl From<&str> for Script {
    fn from(body: &str) -> Self {
        Script::source(body)
    }
}

impl From<String> for Script {
    fn from(body: String) -> Self {
        Script::Source(body)
    }
}

/// Wrap a script so its settlement is reported under `request_id`
pub fn wrap_evaluation(script: &Script, request_id: &str) -> String {
    let id = Value::String(request_id.to_string());
    format!(
        r#"
new Promise((resolve) => resolve(({callable})())).then(
  (result) => {call}({reply}, {id}, null, result),
  (error) => {{
    console.error(error);
    if (typeof error === "object" && error !== null && error instanceof Error)
      error = {{
        name: error.name,
        message: error.message,
        line: error.line,
        column: error.column,
        stack: error.stack,
        cause: error.cause,
      }};
    {call}({reply}, {id}, error);
  }}
);
"#,
        callable = script.callable(),
        call = CALL_BINDING,
        reply = Value::String(EVAL_REPLY.to_string()),
        id = id,
    )
}

/// Fresh request id: a random 64-bit number in base 36
pub fn request_id() -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut rng = rand::rng();
    let mut n: u64 = rng.random();
    let mut id = Vec::with_capacity(13);
    loop {
        id.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    id.reverse();
    String::from_utf8_lossy(&id).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_request_splits_method_and_args() {
        let request = decode_request(r#"["greet","bob",3]"#).unwrap();
        assert_eq!(request.method, "greet");
        assert_eq!(request.args, vec![json!("bob"), json!(3)]);
    }

    #[test]
    fn test_decode_request_rejects_malformed_payloads() {
        let invalid_json = decode_request("[greet").unwrap_err();
        assert_eq!(invalid_json.descriptor().unwrap().name, "SyntaxError");

        let not_array = decode_request(r#"{"method":"greet"}"#).unwrap_err();
        assert_eq!(not_array.descriptor().unwrap().name, "TypeError");

        let empty = decode_request("[]").unwrap_err();
        assert_eq!(empty.descriptor().unwrap().name, "TypeError");

        let numeric = decode_request("[1, 2]").unwrap_err();
        assert_eq!(numeric.descriptor().unwrap().name, "TypeError");
    }

    #[test]
    fn test_encode_success_and_failure() {
        assert_eq!(
            encode_outcome(Ok(json!("hi bob"))),
            (ReturnStatus::Success, r#"[null,"hi bob"]"#.to_string())
        );

        let (status, payload) = encode_outcome(Err(ErrorDescriptor::reference_error("nope").into()));
        assert_eq!(status, ReturnStatus::Failure);
        assert_eq!(
            serde_json::from_str::<Value>(&payload).unwrap(),
            json!([{"name": "ReferenceError", "message": "'nope' is not defined"}])
        );
    }

    #[test]
    fn test_thrown_values_pass_through_unchanged() {
        let (status, payload) = encode_outcome(Err(Thrown::Value(json!({"code": 7}))));
        assert_eq!(status, ReturnStatus::Failure);
        assert_eq!(payload, r#"[{"code":7}]"#);
    }

    #[test]
    fn test_descriptor_from_reply_value() {
        let descriptor = ErrorDescriptor::from_value(&json!({
            "name": "RangeError",
            "message": "x",
            "line": 3,
            "stack": "at <anonymous>",
            "cause": null
        }));
        assert_eq!(descriptor.name, "RangeError");
        assert_eq!(descriptor.message, "x");
        assert_eq!(descriptor.line, Some(3));
        assert_eq!(descriptor.column, None);
        assert_eq!(descriptor.stack.as_deref(), Some("at <anonymous>"));
        assert_eq!(descriptor.cause, None);

        let from_string = ErrorDescriptor::from_value(&json!("boom"));
        assert_eq!(from_string, ErrorDescriptor::error("boom"));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn test_wrap_source_script() {
        let wrapped = wrap_evaluation(&Script::source("return 41+1"), "abc123");
        assert!(wrapped.contains("(async () => {\nreturn 41+1\n})()"));
        assert!(wrapped.contains(r#"__call("__evalReply", "abc123", null, result)"#));
        assert!(wrapped.contains(r#"__call("__evalReply", "abc123", error)"#));
        assert!(wrapped.contains("console.error(error)"));
    }

    #[test]
    fn test_wrap_source_ending_in_line_comment() {
        let wrapped = wrap_evaluation(&Script::source("return 1 // answer"), "abc123");
        let body = wrapped
            .lines()
            .position(|line| line == "return 1 // answer")
            .expect("body on its own line");
        assert_eq!(wrapped.lines().nth(body + 1), Some("})())).then("));
    }

    #[test]
    fn test_wrap_function_script() {
        let wrapped = wrap_evaluation(&Script::function("() => document.title"), "id");
        assert!(wrapped.contains("resolve((() => document.title)())"));
    }

    #[test]
    fn test_request_ids_are_base36_and_distinct() {
        let a = request_id();
        let b = request_id();
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert!(!a.is_empty() && a.len() <= 13);
    }
}
