//! Transient vs permanent failure classification.
//!
//! Managed Postgres (pooled or serverless) drops connections on its own
//! schedule. Those failures are worth a retry; constraint violations,
//! missing rows and malformed queries are not, and must surface on the
//! first attempt.

/// How the retry executor should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Infrastructure-level failure; a later attempt may succeed.
    Transient,
    /// Logical or data error; retrying cannot change the outcome.
    Permanent,
}

impl RetryClass {
    pub const fn is_transient(self) -> bool {
        matches!(self, RetryClass::Transient)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RetryClass::Transient => "transient",
            RetryClass::Permanent => "permanent",
        }
    }
}

/// Errors that can tell the retry executor whether they are worth retrying.
pub trait Classify {
    fn retry_class(&self) -> RetryClass;

    fn is_transient(&self) -> bool {
        self.retry_class().is_transient()
    }
}

/// Error codes that mark a connection-level failure.
///
/// - `P1001` can't reach database server
/// - `P1008` operation timed out
/// - `P1017` server has closed the connection
/// - `57P01`..`57P03` Postgres admin shutdown / crash shutdown / cannot connect now
const TRANSIENT_CODES: &[&str] = &["P1001", "P1008", "P1017", "57P01", "57P02", "57P03"];

/// SQLSTATE class 08 is "connection exception".
const CONNECTION_EXCEPTION_CLASS: &str = "08";

const TRANSIENT_MESSAGES: &[&str] = &[
    "terminating connection",
    "connection closed",
    "Connection terminated",
    "Can't reach database server",
    "server closed the connection",
];

/// Classify a failure from its machine-readable code and message.
///
/// Matching is exact on codes and case-sensitive on message fragments.
pub fn classify_signature(code: Option<&str>, message: &str) -> RetryClass {
    if let Some(code) = code {
        if TRANSIENT_CODES.contains(&code)
            || (code.len() == 5 && code.starts_with(CONNECTION_EXCEPTION_CLASS))
        {
            return RetryClass::Transient;
        }
    }

    if TRANSIENT_MESSAGES.iter().any(|needle| message.contains(needle)) {
        RetryClass::Transient
    } else {
        RetryClass::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_transient() {
        for code in ["P1001", "P1008", "P1017", "57P01", "08006", "08003"] {
            assert_eq!(
                classify_signature(Some(code), "whatever"),
                RetryClass::Transient,
                "code {code}"
            );
        }
    }

    #[test]
    fn message_fragments_are_transient() {
        let messages = [
            "FATAL: terminating connection due to administrator command",
            "error communicating with database: connection closed",
            "Connection terminated unexpectedly",
            "Can't reach database server at `db.example.com:5432`",
            "server closed the connection unexpectedly",
        ];
        for msg in messages {
            assert!(classify_signature(None, msg).is_transient(), "{msg}");
        }
    }

    #[test]
    fn data_errors_are_permanent() {
        assert_eq!(
            classify_signature(
                Some("23505"),
                "duplicate key value violates unique constraint \"blogs_slug_key\""
            ),
            RetryClass::Permanent
        );
        assert_eq!(
            classify_signature(Some("42P01"), "relation \"blogz\" does not exist"),
            RetryClass::Permanent
        );
        assert_eq!(classify_signature(None, "row not found"), RetryClass::Permanent);
    }

    #[test]
    fn message_match_is_case_sensitive() {
        assert!(!classify_signature(None, "CONNECTION CLOSED").is_transient());
    }

    #[test]
    fn short_codes_do_not_match_class() {
        assert!(!classify_signature(Some("08"), "").is_transient());
    }
}
