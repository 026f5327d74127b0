//! HTTP implementation of [`IdentityClient`]

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::identity::{IdentityClient, IdentityError, TokenPair, UserInfo};

/// Identity client over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: Url,
}

impl HttpIdentityClient {
    /// Creates a client whose every call is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialised.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| IdentityError::Unavailable {
                reason: format!("{} cannot be a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, IdentityError> {
        response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse {
                reason: e.to_string(),
            })
    }
}

fn transport_error(err: &reqwest::Error) -> IdentityError {
    if err.is_timeout() {
        IdentityError::Timeout
    } else {
        IdentityError::Unavailable {
            reason: err.to_string(),
        }
    }
}

fn status_error(status: StatusCode) -> IdentityError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            IdentityError::Rejected {
                status: status.as_u16(),
            }
        }
        StatusCode::NOT_FOUND => IdentityError::NotFound,
        other => IdentityError::Unavailable {
            reason: format!("unexpected status {other}"),
        },
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    #[instrument(skip_all, fields(endpoint = "refresh"))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError> {
        let url = self.endpoint(&["refresh"])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Identity refresh answered");
        if !status.is_success() {
            return Err(status_error(status));
        }
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn get_user_info(&self, subject_id: &str) -> Result<UserInfo, IdentityError> {
        let url = self.endpoint(&["users", subject_id])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        Self::decode(response).await
    }
}
