//! Metadata Publisher - registers the release with the version metadata service
//!
//! One authenticated POST per run. Failures are classified, never retried;
//! retry policy belongs to the release pipeline that invoked us.

use crate::core::config::{DEFAULT_METADATA_TIMEOUT, PublishCredentials};
use crate::core::error::ReleaseError;
use crate::release::coordinates::ReleaseCoordinates;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::error::Error as _;
use std::time::Duration;

const ADD_VERSION_PATH: &str = "/add_version/detail";

/// Acknowledgement returned by the metadata service on success
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataAck {
    pub message: String,
}

/// Client for the version metadata service
pub struct MetadataPublisher<'a> {
    client: reqwest::Client,
    credentials: &'a PublishCredentials,
    timeout: Duration,
}

impl<'a> MetadataPublisher<'a> {
    /// Create a publisher with the default 5 second bound
    pub fn new(credentials: &'a PublishCredentials) -> Result<Self, ReleaseError> {
        Self::with_timeout(credentials, DEFAULT_METADATA_TIMEOUT)
    }

    pub fn with_timeout(
        credentials: &'a PublishCredentials,
        timeout: Duration,
    ) -> Result<Self, ReleaseError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReleaseError::Request {
                message: error_chain(&e),
            })?;

        Ok(Self {
            client,
            credentials,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of the add-version endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "http://{}{}",
            self.credentials.endpoint_host.trim_end_matches('/'),
            ADD_VERSION_PATH
        )
    }

    /// Submit `coordinates` and return the service's acknowledgement
    pub async fn publish(
        &self,
        coordinates: &ReleaseCoordinates,
    ) -> Result<MetadataAck, ReleaseError> {
        let endpoint = self.endpoint();
        tracing::info!(%endpoint, %coordinates, "publishing release metadata");

        let response = self
            .client
            .post(&endpoint)
            .basic_auth(
                &self.credentials.username,
                Some(self.credentials.password.expose_secret()),
            )
            .json(coordinates)
            .send()
            .await
            .map_err(|e| self.classify(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match body.trim() {
                "" => status.canonical_reason().unwrap_or_default().to_string(),
                text => text.to_string(),
            };
            tracing::warn!(status = status.as_u16(), "metadata service rejected release");
            return Err(ReleaseError::Server {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify(&endpoint, e))?;

        serde_json::from_str::<MetadataAck>(&body).map_err(|e| ReleaseError::InvalidResponse {
            message: e.to_string(),
        })
    }

    /// Map a transport error onto the release error taxonomy
    ///
    /// Connect failures are checked first, so a connect timeout reports as a
    /// connectivity problem rather than a slow server.
    fn classify(&self, endpoint: &str, error: reqwest::Error) -> ReleaseError {
        if error.is_connect() {
            ReleaseError::Connectivity {
                endpoint: endpoint.to_string(),
                message: error_chain(&error),
            }
        } else if error.is_timeout() {
            ReleaseError::Timeout {
                timeout: self.timeout,
            }
        } else {
            ReleaseError::Request {
                message: error_chain(&error),
            }
        }
    }
}

/// Render an error with all of its sources
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
