use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ApiError;

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

// Presence + non-blankness for each required field. Failures come back as one
// message per field so the client can render them inline.
pub fn require_fields(data: &Map<String, Value>, required: &[&str]) -> Result<(), ApiError> {
    let mut field_errors = BTreeMap::new();

    for field in required {
        if is_blank(data.get(*field)) {
            field_errors.insert((*field).to_string(), format!("field '{field}' is required"));
        }
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation { field_errors })
    }
}
