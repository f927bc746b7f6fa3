//! Repository error type and its retry classification

use blogctl_core::{classify_signature, Classify, RetryClass};

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    /// A business rule refused the write (comments disabled, bad time range, ...)
    #[error("{0}")]
    Rejected(&'static str),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Constraint name when this is a unique violation.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            Self::Sqlx(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Some(db.constraint().unwrap_or_default())
            }
            _ => None,
        }
    }
}

impl Classify for DbError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Sqlx(err) => classify_sqlx(err),
            Self::NotFound { .. } | Self::Conflict(_) | Self::Rejected(_) => RetryClass::Permanent,
        }
    }
}

fn classify_sqlx(err: &sqlx::Error) -> RetryClass {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => RetryClass::Transient,
        sqlx::Error::Database(db) => classify_signature(db.code().as_deref(), db.message()),
        other => classify_signature(None, &other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn io_and_pool_timeouts_are_transient() {
        let io = DbError::from(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));
        assert!(io.is_transient());
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn domain_errors_are_permanent() {
        assert!(!DbError::not_found("blog", "missing").is_transient());
        assert!(!DbError::Conflict("slug".into()).is_transient());
        assert!(!DbError::Rejected("Voting is disabled for this blog").is_transient());
        assert!(!DbError::from(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn closed_pool_message_is_classified_by_signature() {
        // PoolClosed renders as "attempted to acquire a connection on a closed pool"
        assert!(!DbError::from(sqlx::Error::PoolClosed).is_transient());
        let protocol = sqlx::Error::Protocol("server closed the connection unexpectedly".into());
        assert!(DbError::from(protocol).is_transient());
    }

    #[test]
    fn unique_violation_only_for_database_errors() {
        assert!(DbError::from(sqlx::Error::RowNotFound).unique_violation().is_none());
        assert!(DbError::Conflict("x".into()).unique_violation().is_none());
    }
}
