//! Validated deployment descriptor accepted by `POST /generate`.
//!
//! Validation collects every failing field rather than stopping at the first,
//! so a caller fixing a request sees the whole list at once.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Description of how an application is built and run.  Immutable once
/// constructed; the only way to obtain one is through validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    language: String,
    package_manager: String,
    dependency_file: String,
    port: u16,
    start_command: String,
    build_command: Option<String>,
    base_image: Option<String>,
}

/// One failing field, shaped like the `detail` entries FastAPI-style clients
/// already understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    fn new(field: &str, kind: &str, msg: &str) -> Self {
        let mut loc = vec!["body".to_string()];
        if !field.is_empty() {
            loc.push(field.to_string());
        }
        Self {
            loc,
            msg: msg.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Name of the offending field, or `None` for whole-body errors.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub detail: Vec<FieldError>,
}

impl ValidationError {
    fn body(kind: &str, msg: &str) -> Self {
        Self {
            detail: vec![FieldError::new("", kind, msg)],
        }
    }

    /// Names of the fields that failed validation.
    pub fn fields(&self) -> Vec<&str> {
        self.detail.iter().filter_map(FieldError::field).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .detail
            .iter()
            .map(|e| format!("{}: {}", e.loc.join("."), e.msg))
            .collect();
        write!(f, "invalid request ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

impl DeploymentDescriptor {
    /// Parse and validate a raw request body.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::body("json_invalid", &format!("JSON decode error: {e}")))?;
        Self::from_value(value)
    }

    /// Validate an already-decoded JSON value.  Unknown fields are ignored.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(obj) = value else {
            return Err(ValidationError::body(
                "model_type",
                "Input should be a valid dictionary or object",
            ));
        };

        let mut errors = Vec::new();

        let language = required_str(&obj, "language", &mut errors);
        let package_manager = required_str(&obj, "package_manager", &mut errors);
        let dependency_file = required_str(&obj, "dependency_file", &mut errors);
        let port = required_port(&obj, "port", &mut errors);
        let start_command = required_str(&obj, "start_command", &mut errors);
        let build_command = optional_str(&obj, "build_command", &mut errors);
        let base_image = optional_str(&obj, "base_image", &mut errors);

        match (language, package_manager, dependency_file, port, start_command) {
            (
                Some(language),
                Some(package_manager),
                Some(dependency_file),
                Some(port),
                Some(start_command),
            ) if errors.is_empty() => Ok(Self {
                language,
                package_manager,
                dependency_file,
                port,
                start_command,
                build_command,
                base_image,
            }),
            _ => Err(ValidationError { detail: errors }),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn dependency_file(&self) -> &str {
        &self.dependency_file
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn start_command(&self) -> &str {
        &self.start_command
    }

    pub fn build_command(&self) -> Option<&str> {
        self.build_command.as_deref()
    }

    pub fn base_image(&self) -> Option<&str> {
        self.base_image.as_deref()
    }
}

fn required_str(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "missing", "Field required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(FieldError::new(
                field,
                "string_too_short",
                "String should have at least 1 character",
            ));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(field, "string_type", "Input should be a valid string"));
            None
        }
    }
}

// Empty strings count as absent so they never produce a dangling prompt line.
fn optional_str(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(field, "string_type", "Input should be a valid string"));
            None
        }
    }
}

fn required_port(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<u16> {
    let value = match obj.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "missing", "Field required"));
            return None;
        }
        Some(v) => v,
    };

    let Some(n) = lax_int(value) else {
        errors.push(FieldError::new(
            field,
            "int_type",
            "Input should be a valid integer",
        ));
        return None;
    };

    match u16::try_from(n) {
        Ok(port) if port > 0 => Some(port),
        _ => {
            errors.push(FieldError::new(
                field,
                "int_range",
                "Input should be between 1 and 65535",
            ));
            None
        }
    }
}

// Integers, whole floats (`8000.0`) and numeric strings (`"8000"`) are all
// accepted, the same coercions a lax pydantic `int` field performs.
fn lax_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
