use std::fmt;

use thiserror::Error;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// A directory call that the service answered with an error.
///
/// Carries the HTTP-level classification (if the status was one the service
/// documents) together with the application-level error document the service
/// may embed in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub http_status: Option<u16>,
    pub message: String,
    pub embedded_code: Option<i64>,
    pub embedded_reason: Option<String>,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(status) = self.http_status {
            write!(f, " ({})", status)?;
        }
        if let Some(code) = self.embedded_code {
            let reason = self.embedded_reason.as_deref().unwrap_or("unknown reason");
            write!(f, " (directory error {}: {})", code, reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

/// The network exchange itself failed; no status code was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("network error: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Keep the source chain: reqwest puts the useful part (dns, tls, timeout) in it
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        TransportError(message)
    }
}

/// A response could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("malformed embedded error document: {0}")]
    ErrorDocument(String),

    #[error("no auth token in login response: {0}")]
    Token(String),

    #[error("malformed directory feed: {0}")]
    Feed(String),
}

impl ParseFailure {
    /// The body is not quoted: login responses carry other secrets.
    pub(crate) fn token(body: &str) -> Self {
        ParseFailure::Token(format!("no Auth= line in {} byte response", body.len()))
    }
}

/// Why a login exchange did not produce a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error(transparent)]
    Network(#[from] TransportError),

    #[error("login rejected: {0}")]
    Rejected(ClassifiedError),

    #[error("credential store unavailable: {0}")]
    CredentialStore(String),
}

/// Outcome of waiting for a usable directory session.
///
/// `Clone` because one failed login is reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("directory credentials are not configured (missing {0})")]
    Configuration(String),

    #[error("login failed: {0}")]
    Login(#[from] LoginFailure),

    #[error("timed out waiting for the directory session")]
    Timeout,

    #[error("directory connection disabled")]
    Disabled,

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("session manager shut down")]
    Closed,
}

impl SessionError {
    /// Whether a later call could succeed without operator intervention.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            SessionError::Disabled | SessionError::Configuration(_) | SessionError::Closed
        )
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Login(LoginFailure::Network(err))
    }
}

/// Error returned by directory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("directory error: {0}")]
    Protocol(ClassifiedError),

    #[error(transparent)]
    Network(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("invalid directory url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// The classified service error, if that is what this is.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_error_display() {
        let err = ClassifiedError {
            http_status: Some(403),
            message: "Unsupported parameter or failed authorization.".to_string(),
            embedded_code: Some(1301),
            embedded_reason: Some("EntityDoesNotExist".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported parameter or failed authorization. (403) (directory error 1301: EntityDoesNotExist)"
        );

        let bare = ClassifiedError {
            http_status: Some(404),
            message: "Directory resource not found.".to_string(),
            embedded_code: None,
            embedded_reason: None,
        };
        assert_eq!(bare.to_string(), "Directory resource not found. (404)");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");

        let long = "é".repeat(400); // 800 bytes, 2 per char
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("(truncated, 800 total bytes)"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn test_retriable() {
        assert!(SessionError::Timeout.is_retriable());
        assert!(SessionError::Login(LoginFailure::CredentialStore("locked".into())).is_retriable());
        assert!(!SessionError::Disabled.is_retriable());
        assert!(!SessionError::Configuration("password".into()).is_retriable());
    }
}
