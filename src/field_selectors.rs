//! Field selector evaluation for the mock server's CRUD mode
//!
//! A real API server only accepts a handful of indexed fields per kind; the
//! mock accepts any dotted path into the object (`metadata.name`,
//! `spec.nodeName`, `status.phase`, ...) and compares its scalar value as a
//! string. Only `=`, `==` and `!=` are meaningful for fields.

use serde_json::Value;

/// Scalar at a dotted path, rendered as a string
pub fn field_value(obj: &Value, path: &str) -> Option<String> {
    let pointer = format!("/{}", path.replace('.', "/"));
    match obj.pointer(&pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether the object satisfies every requirement of a field selector
///
/// A missing field never equals a value and always differs from one.
pub fn matches_field_selector(obj: &Value, selector: &str) -> Result<bool, String> {
    for requirement in selector.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let (path, expected, negate) = if let Some((p, v)) = requirement.split_once("!=") {
            (p, v, true)
        } else if let Some((p, v)) = requirement
            .split_once("==")
            .or_else(|| requirement.split_once('='))
        {
            (p, v, false)
        } else {
            return Err(format!("invalid field selector requirement '{}'", requirement));
        };

        let actual = field_value(obj, path.trim());
        let equal = actual.as_deref() == Some(expected.trim());
        if equal == negate {
            return Ok(false);
        }
    }
    Ok(true)
}
