//! Validation error types and field helpers

use std::collections::BTreeMap;
use std::fmt;

/// Validation error for a single request field
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., slug)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside the accepted range
    OutOfRange { field: &'static str, min: i64, max: i64 },
}

impl ValidationError {
    /// Name of the offending field, as the client sent it.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. }
            | Self::OutOfRange { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} is required", field),
            Self::TooLong { field, max } => {
                write!(f, "{} must not exceed {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// All field errors found in one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    /// Keep the value if valid, otherwise record the error.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// `Ok(())` when nothing was recorded.
    pub fn finish(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Messages grouped by field, for the `details.fields` response member.
    pub fn by_field(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut fields: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for err in &self.0 {
            fields.entry(err.field()).or_default().push(err.to_string());
        }
        fields
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Trimmed, non-empty text of at most `max` characters.
pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Trimmed optional text; blank input becomes `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(text) => Ok(Some(text.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 500,
        };
        assert_eq!(err.to_string(), "title must not exceed 500 characters");
        assert_eq!(err.field(), "title");
    }

    #[test]
    fn groups_by_field() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::Empty { field: "name" });
        errors.push(ValidationError::TooLong {
            field: "name",
            max: 255,
        });
        errors.push(ValidationError::Empty { field: "comment" });

        let fields = errors.by_field();
        assert_eq!(fields["name"].len(), 2);
        assert_eq!(fields["comment"], vec!["comment is required"]);
    }

    #[test]
    fn text_helpers_trim() {
        assert_eq!(required_text("title", "  Hi  ", 10).unwrap(), "Hi");
        assert!(matches!(
            required_text("title", "   ", 10),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            required_text("title", "abcdef", 5),
            Err(ValidationError::TooLong { max: 5, .. })
        ));
        assert_eq!(optional_text("author", Some("  "), 5).unwrap(), None);
        assert_eq!(optional_text("author", None, 5).unwrap(), None);
    }

    #[test]
    fn finish_reports_collected_errors() {
        assert!(ValidationErrors::new().finish().is_ok());
        let errors = ValidationErrors::from(ValidationError::Empty { field: "q" });
        assert_eq!(errors.finish().unwrap_err().errors().len(), 1);
    }
}
