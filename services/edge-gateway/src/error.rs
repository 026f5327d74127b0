//! Error handling module with type-safe, non-exhaustive error types
//!
//! Every failure the gateway can answer with is a [`GatewayError`]. Each
//! variant maps to a stable [`ErrorCode`], which owns the HTTP status and the
//! public message. Internal details never reach a response body.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No `Authorization` header on a path that requires one
    #[error("Authorization header missing")]
    CredentialMissing,

    /// Header or token is structurally wrong
    #[error("Token malformed: {reason}")]
    TokenMalformed {
        /// Description of the malformation
        reason: String,
    },

    /// Token has a valid signature but is past its expiry
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },

    /// Signature does not verify against the configured secret
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// Access credential is stale and no usable refresh credential was presented
    #[error("Session expired")]
    SessionExpired,

    /// Identity service refused the refresh credential
    #[error("Refresh credential rejected by identity service")]
    RefreshInvalid,

    /// Identity service unreachable, timed out, or answered with garbage
    #[error("Identity service unavailable: {reason}")]
    RefreshServiceUnavailable {
        /// What went wrong talking to the identity service
        reason: String,
    },

    /// Authenticated caller lacks the role a privileged path requires
    #[error("Role {required} required")]
    Forbidden {
        /// Role the path requires
        required: String,
    },

    /// Path carries dot segments or encoded separators
    #[error("Non-canonical request path {path}")]
    PathRejected {
        /// Request path as received
        path: String,
    },

    /// No route matches the request path
    #[error("No route for {path}")]
    RouteNotFound {
        /// Request path
        path: String,
    },

    /// Backend refused the connection or failed mid-request
    #[error("Backend {backend} unavailable")]
    BackendUnavailable {
        /// Logical backend name
        backend: String,
    },

    /// Backend did not answer in time
    #[error("Backend {backend} timed out after {after:?}")]
    BackendTimeout {
        /// Logical backend name
        backend: String,
        /// Configured forward timeout
        after: Duration,
    },

    /// Request body exceeds the forwarding limit
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Invalid configuration detected at startup
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stable error codes for logs, metrics and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No credential presented
    CredentialMissing,
    /// Credential could not be parsed
    TokenMalformed,
    /// Credential past its expiry
    TokenExpired,
    /// Credential signed with another key
    SignatureInvalid,
    /// Refresh needed but impossible
    SessionExpired,
    /// Identity service refused the refresh
    RefreshInvalid,
    /// Identity service unreachable
    IdentityUnavailable,
    /// Role missing
    Forbidden,
    /// Path not canonical
    PathRejected,
    /// No backend for the path
    RouteNotFound,
    /// Backend unreachable
    BackendUnavailable,
    /// Backend too slow
    BackendTimeout,
    /// Body above the limit
    PayloadTooLarge,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialMissing => "AUTH_CREDENTIAL_MISSING",
            Self::TokenMalformed => "AUTH_TOKEN_MALFORMED",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::SignatureInvalid => "AUTH_SIGNATURE_INVALID",
            Self::SessionExpired => "AUTH_SESSION_EXPIRED",
            Self::RefreshInvalid => "AUTH_REFRESH_INVALID",
            Self::IdentityUnavailable => "IDENTITY_UNAVAILABLE",
            Self::Forbidden => "AUTH_FORBIDDEN",
            Self::PathRejected => "PATH_REJECTED",
            Self::RouteNotFound => "ROUTE_NOT_FOUND",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::BackendTimeout => "BACKEND_TIMEOUT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status for this error
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::CredentialMissing
            | Self::TokenMalformed
            | Self::TokenExpired
            | Self::SignatureInvalid
            | Self::SessionExpired
            | Self::RefreshInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::IdentityUnavailable | Self::BackendUnavailable => StatusCode::BAD_GATEWAY,
            Self::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::PathRejected => StatusCode::BAD_REQUEST,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to callers.
    ///
    /// Malformed, expired and forged credentials share one message so the
    /// response never tells a caller which check failed.
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::CredentialMissing => "Authentication required",
            Self::TokenMalformed | Self::TokenExpired | Self::SignatureInvalid => {
                "Invalid or expired credentials"
            }
            Self::SessionExpired | Self::RefreshInvalid => "Session expired, please sign in again",
            Self::IdentityUnavailable => "Authentication service temporarily unavailable",
            Self::Forbidden => "Access denied",
            Self::PathRejected => "Malformed request path",
            Self::RouteNotFound => "No route for request",
            Self::BackendUnavailable => "Upstream service unavailable",
            Self::BackendTimeout => "Upstream service timed out",
            Self::PayloadTooLarge => "Request body too large",
            Self::Internal => "Internal error",
        }
    }
}

impl GatewayError {
    /// Get the error code for this error
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CredentialMissing => ErrorCode::CredentialMissing,
            Self::TokenMalformed { .. } => ErrorCode::TokenMalformed,
            Self::TokenExpired { .. } => ErrorCode::TokenExpired,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::RefreshInvalid => ErrorCode::RefreshInvalid,
            Self::RefreshServiceUnavailable { .. } => ErrorCode::IdentityUnavailable,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::PathRejected { .. } => ErrorCode::PathRejected,
            Self::RouteNotFound { .. } => ErrorCode::RouteNotFound,
            Self::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Self::BackendTimeout { .. } => ErrorCode::BackendTimeout,
            Self::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            Self::Config(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status for this error
    pub const fn http_status(&self) -> StatusCode {
        self.code().http_status()
    }

    /// Whether the failure came from the caller's credentials rather than
    /// from the gateway or its collaborators
    pub fn is_credential_failure(&self) -> bool {
        self.http_status() == StatusCode::UNAUTHORIZED
    }

    /// Check if this error is retryable by the caller
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RefreshServiceUnavailable { .. }
                | Self::BackendUnavailable { .. }
                | Self::BackendTimeout { .. }
        )
    }

    /// Shorthand for a malformed-token error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::TokenMalformed {
            reason: reason.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::TokenExpired {
                expired_at: Utc::now(),
            },
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::malformed(format!("missing required claim `{claim}`"))
            }
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::malformed("unsupported signing algorithm")
            }
            ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                Self::malformed("undecodable segment")
            }
            _ => Self::malformed("not a signed token"),
        }
    }
}
