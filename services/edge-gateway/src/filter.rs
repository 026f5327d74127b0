//! Edge filter: the per-request authentication decision
//!
//! One pass, no loops. Each request is classified, its credentials are
//! assessed, a refresh is attempted at most once, and the result is an
//! [`AuthOutcome`] value. The filter never touches the request itself; header
//! rewriting is left to the caller via [`rewrite_credentials`].

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::guard::RoleGuard;
use crate::identity::TokenPair;
use crate::jwt::{Claims, CredentialValidator, Usability};
use crate::policy::{MalformedHeaderPolicy, PathClass, PathClassifier};
use crate::refresh::RefreshCoordinator;
use crate::responder::ErrorStatus;

/// Header carrying the refresh credential.
pub const REFRESH_TOKEN_HEADER: &str = "refresh-token";

const BEARER_PREFIX: &str = "Bearer ";

/// Percent escapes for `.`, `/` and `\`, lowercased.
const ENCODED_SEPARATORS: [&str; 3] = ["%2e", "%2f", "%5c"];

/// Checks that `path` means the same thing to the classifier, the router and
/// the backend.
///
/// Dot segments, backslashes and percent-encoded separators are rejected
/// outright. URL joining would resolve them after classification, letting a
/// path like `/books/../users/me` pass as public.
///
/// # Errors
///
/// Returns [`GatewayError::PathRejected`] for any non-canonical path.
pub fn ensure_canonical_path(path: &str) -> Result<(), GatewayError> {
    let lowered = path.to_ascii_lowercase();
    let dot_segment = path.split('/').any(|segment| segment == "." || segment == "..");
    let encoded = ENCODED_SEPARATORS.iter().any(|escape| lowered.contains(escape));

    if dot_segment || encoded || path.contains('\\') {
        return Err(GatewayError::PathRejected {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Read-only view of the parts of a request the filter looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    /// Request method
    pub method: &'a Method,
    /// Request path, without the query
    pub path: &'a str,
    /// Request headers
    pub headers: &'a HeaderMap,
}

impl<'a> RequestView<'a> {
    /// Borrows the relevant parts of a request
    pub const fn new(method: &'a Method, path: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path,
            headers,
        }
    }
}

/// Decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Forward unchanged
    Allow,
    /// Forward with the credential headers replaced by the new pair
    AllowWithRewrittenHeaders(TokenPair),
    /// Answer with this rejection
    Reject(ErrorStatus),
}

impl AuthOutcome {
    /// Metric label for the decision
    pub const fn decision(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::AllowWithRewrittenHeaders(_) => "refreshed",
            Self::Reject(_) => "reject",
        }
    }
}

enum BearerHeader<'a> {
    Absent,
    Malformed,
    Token(&'a str),
}

fn bearer_token(headers: &HeaderMap) -> BearerHeader<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return BearerHeader::Absent;
    };
    match value.to_str().ok().and_then(|v| v.strip_prefix(BEARER_PREFIX)) {
        Some(token) if !token.trim().is_empty() => BearerHeader::Token(token.trim()),
        _ => BearerHeader::Malformed,
    }
}

fn refresh_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix(BEARER_PREFIX).unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
}

/// Replaces `Authorization` and `Refresh-Token` with the new pair.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if a token is not a valid header value.
pub fn rewrite_credentials(headers: &mut HeaderMap, pair: &TokenPair) -> Result<(), GatewayError> {
    let mut access = HeaderValue::try_from(format!("{BEARER_PREFIX}{}", pair.access_token))
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("access token header: {e}")))?;
    let mut refresh = HeaderValue::try_from(pair.refresh_token.as_str())
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("refresh token header: {e}")))?;
    access.set_sensitive(true);
    refresh.set_sensitive(true);

    headers.insert(AUTHORIZATION, access);
    headers.insert(REFRESH_TOKEN_HEADER, refresh);
    Ok(())
}

fn reject(err: &GatewayError) -> AuthOutcome {
    debug!(error_type = err.code().as_str(), "Request rejected");
    AuthOutcome::Reject(ErrorStatus::from_error(err))
}

/// The authentication pipeline, shared by all requests.
#[derive(Clone)]
pub struct EdgeFilter {
    classifier: PathClassifier,
    validator: CredentialValidator,
    refresher: RefreshCoordinator,
    guard: RoleGuard,
}

impl EdgeFilter {
    /// Assembles the pipeline
    pub const fn new(
        classifier: PathClassifier,
        validator: CredentialValidator,
        refresher: RefreshCoordinator,
        guard: RoleGuard,
    ) -> Self {
        Self {
            classifier,
            validator,
            refresher,
            guard,
        }
    }

    /// Path classifier in use
    pub const fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Decides what to do with a request at the current time
    pub async fn evaluate(&self, request: RequestView<'_>) -> AuthOutcome {
        self.evaluate_at(request, Utc::now()).await
    }

    /// Decides what to do with a request as of `now`
    pub async fn evaluate_at(&self, request: RequestView<'_>, now: DateTime<Utc>) -> AuthOutcome {
        if let Err(err) = ensure_canonical_path(request.path) {
            warn!(path = request.path, "Non-canonical path rejected");
            return reject(&err);
        }

        let class = self.classifier.classify(request.method, request.path);
        debug!(path = request.path, class = class.as_str(), "Path classified");

        match class {
            PathClass::Exempt => return AuthOutcome::Allow,
            PathClass::ConditionallyExempt { .. }
                if !request.headers.contains_key(AUTHORIZATION) =>
            {
                return AuthOutcome::Allow;
            }
            _ => {}
        }

        let access_token = match bearer_token(request.headers) {
            BearerHeader::Token(token) => token,
            BearerHeader::Absent => return reject(&GatewayError::CredentialMissing),
            BearerHeader::Malformed => {
                return match class {
                    PathClass::ConditionallyExempt {
                        on_malformed: MalformedHeaderPolicy::Forward,
                    } => AuthOutcome::Allow,
                    _ => reject(&GatewayError::malformed("authorization is not a bearer credential")),
                };
            }
        };

        match self.validator.assess_at(access_token, now) {
            Usability::Usable(claims) => match self.authorize(class, &claims).await {
                Ok(()) => AuthOutcome::Allow,
                Err(err) => reject(&err),
            },
            Usability::Invalid(err) => reject(&err),
            Usability::Stale => match self.refresh(class, request.headers, now).await {
                Ok(pair) => AuthOutcome::AllowWithRewrittenHeaders(pair),
                Err(err) => reject(&err),
            },
        }
    }

    async fn refresh(
        &self,
        class: PathClass,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, GatewayError> {
        let refresh_token = refresh_token(headers)
            .filter(|token| self.validator.is_usable_at(token, now))
            .ok_or(GatewayError::SessionExpired)?;

        let pair = self.refresher.refresh(refresh_token).await?;

        let Usability::Usable(claims) = self.validator.assess_at(&pair.access_token, now) else {
            return Err(GatewayError::RefreshServiceUnavailable {
                reason: "identity service issued an unusable access credential".to_string(),
            });
        };
        self.authorize(class, &claims).await?;

        Ok(pair)
    }

    async fn authorize(&self, class: PathClass, claims: &Claims) -> Result<(), GatewayError> {
        if class == PathClass::RequiresAdmin {
            self.guard.authorize(claims).await
        } else {
            Ok(())
        }
    }
}
