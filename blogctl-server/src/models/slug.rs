//! Slug validation for path parameters and client-chosen slugs

use blogctl_core::is_valid_slug;

use super::ValidationError;

/// Maximum length for slugs (matches the column width)
const MAX_SLUG_LEN: usize = 255;

/// Validated slug: lowercase alphanumerics and hyphens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    /// Create a slug, validating its format.
    ///
    /// # Example
    /// ```
    /// use blogctl_server::models::Slug;
    ///
    /// assert!(Slug::new("my-first-post").is_ok());
    /// assert!(Slug::new("My Post").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::for_field("slug", s)
    }

    /// Same rules, reported against a different field name.
    pub fn for_field(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field });
        }

        if trimmed.len() > MAX_SLUG_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_SLUG_LEN,
            });
        }

        if !is_valid_slug(trimmed) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must be lowercase with hyphens only",
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Get the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        assert!(Slug::new("hello-world").is_ok());
        assert!(Slug::new("2024-recap").is_ok());
        assert!(Slug::new("a").is_ok());
    }

    #[test]
    fn rejects_uppercase_and_underscores() {
        for bad in ["Hello", "hello_world", "hello world", "héllo"] {
            let err = Slug::new(bad).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidFormat { .. }), "{bad}");
        }
    }

    #[test]
    fn rejects_empty() {
        let err = Slug::new("  ").unwrap_err();
        assert!(matches!(err, ValidationError::Empty { field: "slug" }));
    }

    #[test]
    fn max_length() {
        assert!(Slug::new(&"a".repeat(255)).is_ok());
        let err = Slug::new(&"a".repeat(256)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 255, .. }));
    }
}
