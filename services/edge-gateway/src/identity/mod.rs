//! Identity service client
//!
//! The gateway talks to the identity service for two things only: exchanging
//! a refresh credential for a fresh token pair, and (when live role lookup is
//! enabled) reading a user's current role and status.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::jwt::Role;

pub use http::HttpIdentityClient;

/// Access and refresh credentials issued together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// New access credential
    #[serde(alias = "accessJwt")]
    pub access_token: String,
    /// New refresh credential
    #[serde(alias = "refreshJwt")]
    pub refresh_token: String,
}

impl TokenPair {
    /// Pairs the two credentials
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Current account state of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Subject id
    pub subject_id: String,
    /// Current role
    pub role: Role,
    /// Account status, `ACTIVE` when usable
    pub status: String,
}

impl UserInfo {
    /// Whether the account may act
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }
}

/// Identity call failures.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Service answered and refused the request
    #[error("Identity service rejected the request with status {status}")]
    Rejected {
        /// HTTP status of the refusal
        status: u16,
    },

    /// Subject unknown to the identity service
    #[error("Subject not found")]
    NotFound,

    /// Transport failure or 5xx answer
    #[error("Identity service unavailable: {reason}")]
    Unavailable {
        /// Transport error or status line
        reason: String,
    },

    /// No answer within the configured bound
    #[error("Identity service timed out")]
    Timeout,

    /// Success status with an undecodable body
    #[error("Invalid identity response: {reason}")]
    InvalidResponse {
        /// Decoder message
        reason: String,
    },
}

/// Client abstraction so tests can count and script identity calls.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchanges a refresh credential for a new token pair.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Rejected`] when the credential is refused, any other
    /// variant when the service cannot give an answer.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError>;

    /// Reads a subject's current role and status.
    ///
    /// # Errors
    ///
    /// [`IdentityError::NotFound`] for unknown subjects, transport variants otherwise.
    async fn get_user_info(&self, subject_id: &str) -> Result<UserInfo, IdentityError>;
}
