use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoerceError {
    #[error("field {field} is not an integer: {value:?}")]
    NotAnInteger { field: String, value: String },

    #[error("field {field} is not a number: {value:?}")]
    NotANumber { field: String, value: String },

    #[error("field {field} is missing")]
    Missing { field: String },
}

/// Untyped body of a response: leaf fields by name plus the key/value
/// entries of map-shaped answers, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub fields: BTreeMap<String, String>,
    pub entries: Vec<(String, String)>,
}

impl RawResponse {
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn text(&self, name: &str) -> String {
        self.optional_text(name).unwrap_or_default()
    }

    /// Missing fields read as `0`.
    pub fn int(&self, name: &str) -> Result<i64, CoerceError> {
        self.fields
            .get(name)
            .map_or(Ok(0), |value| coerce_int(name, value))
    }

    /// Like [`RawResponse::int`] but a missing, nil or blank field is an error.
    pub fn required_int(&self, name: &str) -> Result<i64, CoerceError> {
        match self.fields.get(name) {
            Some(value) if !value.trim().is_empty() => coerce_int(name, value),
            _ => Err(CoerceError::Missing {
                field: name.to_string(),
            }),
        }
    }

    /// Missing fields read as `0.0`.
    pub fn float(&self, name: &str) -> Result<f64, CoerceError> {
        self.fields
            .get(name)
            .map_or(Ok(0.0), |value| coerce_float(name, value))
    }

    /// Missing fields read as `true`, like any value other than "false".
    pub fn bool(&self, name: &str) -> bool {
        self.fields.get(name).is_none_or(|value| coerce_bool(value))
    }
}

/// `false` only for a case-insensitive "false".
pub fn coerce_bool(value: &str) -> bool {
    !value.eq_ignore_ascii_case("false")
}

/// Integer parsing that also accepts decimal notation, truncating it.
pub fn coerce_int(field: &str, value: &str) -> Result<i64, CoerceError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    if let Ok(parsed) = value.parse::<i64>() {
        return Ok(parsed);
    }
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed.trunc() as i64),
        _ => Err(CoerceError::NotAnInteger {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn coerce_float(field: &str, value: &str) -> Result<f64, CoerceError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value.parse::<f64>().map_err(|_| CoerceError::NotANumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_coercion() {
        assert!(!coerce_bool("False"));
        assert!(!coerce_bool("false"));
        assert!(!coerce_bool("FALSE"));
        assert!(coerce_bool("other"));
        assert!(coerce_bool("true"));
        assert!(coerce_bool("0"));
        assert!(coerce_bool(""));
        assert!(coerce_bool(" false"));
        assert!(coerce_bool("false\n"));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_numeric_coercion() {
        assert_eq!(coerce_int("time", "42"), Ok(42));
        assert_eq!(coerce_int("time", " -3 "), Ok(-3));
        assert_eq!(coerce_int("time", "7.9"), Ok(7));
        assert_eq!(coerce_float("time", "3.14"), Ok(3.14));
        assert_eq!(coerce_float("time", "2"), Ok(2.0));
        assert!(matches!(
            coerce_int("memory", "lots"),
            Err(CoerceError::NotAnInteger { .. })
        ));
        assert!(matches!(
            coerce_float("time", "fast"),
            Err(CoerceError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_missing_fields() {
        let raw = RawResponse::default().with_field("public", "False");

        assert_eq!(raw.int("status"), Ok(0));
        assert_eq!(raw.float("time"), Ok(0.0));
        assert_eq!(raw.text("link"), "");
        assert_eq!(raw.optional_text("output"), None);
        assert!(!raw.bool("public"));
        assert!(raw.bool("oOok"));
    }

    #[test]
    fn test_required_fields() {
        let raw = RawResponse::default()
            .with_field("status", "3")
            .with_field("result", " ");

        assert_eq!(raw.required_int("status"), Ok(3));
        assert_eq!(
            raw.required_int("result"),
            Err(CoerceError::Missing {
                field: "result".to_string()
            })
        );
        assert!(matches!(
            raw.required_int("memory"),
            Err(CoerceError::Missing { .. })
        ));
    }
}
