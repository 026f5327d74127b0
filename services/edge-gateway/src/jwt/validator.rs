//! Credential usability checks
//!
//! Turns codec results into usability signals. Parse and signature failures
//! stop here: callers get a [`Usability`] value or a plain `bool`, never a
//! propagated error.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::GatewayError;
use crate::jwt::claims::Claims;
use crate::jwt::codec::TokenCodec;

/// A credential must outlive `now` by more than this many seconds to be usable.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 5;

/// Result of assessing one credential.
#[derive(Debug)]
pub enum Usability {
    /// Signature verified and expiry comfortably in the future
    Usable(Claims),
    /// Authentic but expired or about to expire; a refresh may help
    Stale,
    /// Malformed or forged; refreshing must not be attempted
    Invalid(GatewayError),
}

impl Usability {
    /// Whether the credential may be used for this request
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Usable(_))
    }
}

/// Validator answering "is this credential usable right now".
#[derive(Clone)]
pub struct CredentialValidator {
    codec: Arc<TokenCodec>,
}

impl CredentialValidator {
    /// Creates a validator backed by the shared codec
    pub const fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Whether `token` is usable at the current time
    pub fn is_usable(&self, token: &str) -> bool {
        self.is_usable_at(token, Utc::now())
    }

    /// Whether `token` is usable at `now`
    pub fn is_usable_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.assess_at(token, now).is_usable()
    }

    /// Classifies `token` at the current time
    pub fn assess(&self, token: &str) -> Usability {
        self.assess_at(token, Utc::now())
    }

    /// Classifies `token` as usable, stale or invalid at `now`
    pub fn assess_at(&self, token: &str, now: DateTime<Utc>) -> Usability {
        match self.codec.verify_at(token, now) {
            Ok(claims)
                if claims.expires_at() - now > TimeDelta::seconds(EXPIRY_SAFETY_MARGIN_SECS) =>
            {
                Usability::Usable(claims)
            }
            Ok(claims) => {
                debug!(
                    subject = %claims.sub,
                    expires_at = %claims.expires_at(),
                    "Credential inside expiry safety margin"
                );
                Usability::Stale
            }
            Err(GatewayError::TokenExpired { expired_at }) => {
                debug!(expired_at = %expired_at, "Credential expired");
                Usability::Stale
            }
            Err(err @ GatewayError::SignatureInvalid) => {
                let subject_hint = TokenCodec::decode_without_verification(token).ok();
                error!(
                    error_type = err.code().as_str(),
                    subject_hint = ?subject_hint,
                    "Credential signature rejected; possible key rotation mismatch or tampering"
                );
                Usability::Invalid(err)
            }
            Err(err) => {
                warn!(error = %err, error_type = err.code().as_str(), "Credential malformed");
                Usability::Invalid(err)
            }
        }
    }
}
