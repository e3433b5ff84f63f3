//! Failure taxonomy for remote operations.

use std::fmt;
use thiserror::Error;

/// Result type for remote-store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The closed set of categories every remote failure is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport failure, timeout or unreachable host.
    Connectivity,
    /// Missing, expired or invalid credentials.
    Authentication,
    /// Credentials valid but the action is not permitted.
    Authorization,
    /// The target row does not exist.
    NotFound,
    /// Uniqueness or version conflict.
    Conflict,
    /// The request was malformed or violated a constraint.
    Validation,
    /// The remote asked the client to slow down.
    RateLimitExceeded,
    /// Anything else, including transient server-side failures.
    Unknown,
}

impl ErrorCategory {
    /// Returns true if repeating the same operation could plausibly succeed.
    ///
    /// Permanent rejections (authentication, authorization, not found,
    /// conflict, validation) are never retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Connectivity | ErrorCategory::RateLimitExceeded | ErrorCategory::Unknown
        )
    }

    /// Returns true for failures that mean the remote could not be reached.
    #[must_use]
    pub const fn is_connectivity(self) -> bool {
        matches!(self, ErrorCategory::Connectivity)
    }

    /// Returns a stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Validation => "validation",
            ErrorCategory::RateLimitExceeded => "rate_limit_exceeded",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure returned by the remote-store collaborator.
///
/// Adapters build these at the collaborator boundary, either directly from a
/// structured error surface or with [`RemoteError::from_status`] /
/// [`RemoteError::from_message`]. Business logic only ever looks at
/// [`category`](RemoteError::category).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category} error: {message}")]
pub struct RemoteError {
    category: ErrorCategory,
    message: String,
    already_applied: bool,
}

impl RemoteError {
    /// Creates an error with an explicit category.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            already_applied: false,
        }
    }

    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Connectivity, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Authentication, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Authorization, message)
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RateLimitExceeded, message)
    }

    /// Creates an unclassified error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    /// Creates a conflict meaning "the remote already holds this change".
    ///
    /// Replays treat this outcome as success.
    pub fn already_applied(message: impl Into<String>) -> Self {
        Self {
            already_applied: true,
            ..Self::conflict(message)
        }
    }

    /// Classifies an HTTP-style status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let category = match status {
            401 => ErrorCategory::Authentication,
            403 => ErrorCategory::Authorization,
            404 | 410 => ErrorCategory::NotFound,
            409 | 412 => ErrorCategory::Conflict,
            400 | 413..=415 | 422 => ErrorCategory::Validation,
            429 => ErrorCategory::RateLimitExceeded,
            408 | 502..=504 => ErrorCategory::Connectivity,
            _ => ErrorCategory::Unknown,
        };
        Self::new(category, message)
    }

    /// Classifies a free-form error message by pattern.
    ///
    /// Only collaborator adapters should call this; the rest of the system
    /// works on the resulting category.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let category = classify_message(&message);
        Self::new(category, message)
    }

    /// Returns the failure category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the underlying message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the remote reports the change as already present.
    #[must_use]
    pub fn is_already_applied(&self) -> bool {
        self.already_applied
    }

    /// Returns true if the failure is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

const PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::RateLimitExceeded,
        &["rate limit", "too many requests", "429"],
    ),
    (
        ErrorCategory::Authentication,
        &["unauthorized", "unauthenticated", "jwt", "invalid token", "session expired", "401"],
    ),
    (
        ErrorCategory::Authorization,
        &["permission denied", "forbidden", "not authorized", "row-level security", "403"],
    ),
    (
        ErrorCategory::Connectivity,
        &[
            "network",
            "socket",
            "connection",
            "timed out",
            "timeout",
            "unreachable",
            "dns",
            "offline",
        ],
    ),
    (
        ErrorCategory::NotFound,
        &["not found", "no rows", "does not exist", "404"],
    ),
    (
        ErrorCategory::Conflict,
        &["duplicate key", "unique constraint", "already exists", "conflict", "409", "23505"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid", "malformed", "violates", "check constraint", "bad request", "400", "422"],
    ),
];

fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lower.contains(needle)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
