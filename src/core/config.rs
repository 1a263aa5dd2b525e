//! Configuration for a release run
//!
//! All settings come from the process environment and are read exactly once,
//! at start-up, into a [`ReleaseConfig`]. The publishing components only ever
//! see the values passed to them; nothing below the entry point touches the
//! environment.

use crate::core::error::ReleaseError;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const METADATA_USERNAME: &str = "METADATA_USERNAME";
pub const METADATA_PASSWORD: &str = "METADATA_PASSWORD";
pub const METADATA_URL: &str = "METADATA_URL";
pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const PROD_PWD: &str = "PROD_PWD";
pub const NIGHT_PWD: &str = "NIGHT_PWD";
pub const PRIMARY_PROJECT: &str = "RELEASE_PRIMARY_PROJECT";
pub const TEST_REPOSITORY: &str = "RELEASE_TEST_REPOSITORY";

/// Project identity of the primary release channel
pub const DEFAULT_PRIMARY_PROJECT: &str = "taichi";

/// Repository name twine knows the test index by
pub const DEFAULT_TEST_REPOSITORY: &str = "testpypi";

pub const DEFAULT_DIST_DIR: &str = "dist";

/// Upper bound for the metadata POST
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Credentials and endpoint for the metadata service
pub struct PublishCredentials {
    pub username: String,
    pub password: SecretString,
    /// `host[:port]` of the metadata service, without scheme
    pub endpoint_host: String,
}

impl fmt::Debug for PublishCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("endpoint_host", &self.endpoint_host)
            .finish()
    }
}

/// Release channel selected from the project identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseChannel {
    /// Project identity equals the primary name; default index
    Production,
    /// Any other identity; explicit test index
    Test,
}

impl ReleaseChannel {
    pub fn from_project(project_name: &str, primary: &str) -> Self {
        if project_name == primary {
            ReleaseChannel::Production
        } else {
            ReleaseChannel::Test
        }
    }

    /// Environment variable holding the index token for this channel
    pub fn credential_variable(&self) -> &'static str {
        match self {
            ReleaseChannel::Production => PROD_PWD,
            ReleaseChannel::Test => NIGHT_PWD,
        }
    }

    pub fn use_test_index(&self) -> bool {
        matches!(self, ReleaseChannel::Test)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseChannel::Production => "production",
            ReleaseChannel::Test => "test",
        }
    }
}

/// Settings for the package-index upload
///
/// The tokens are kept as read; whether the one the channel needs is present
/// is decided by the uploader, so a missing token fails the upload phase and
/// not start-up.
pub struct UploadSettings {
    pub project_name: String,
    pub primary_project: String,
    pub test_repository: String,
    pub prod_token: Option<SecretString>,
    pub nightly_token: Option<SecretString>,
}

impl UploadSettings {
    pub fn channel(&self) -> ReleaseChannel {
        ReleaseChannel::from_project(&self.project_name, &self.primary_project)
    }

    /// Token for `channel`, if set and non-empty
    pub fn token_for(&self, channel: ReleaseChannel) -> Option<&SecretString> {
        let token = match channel {
            ReleaseChannel::Production => self.prod_token.as_ref(),
            ReleaseChannel::Test => self.nightly_token.as_ref(),
        };
        token.filter(|t| !t.expose_secret().is_empty())
    }
}

impl fmt::Debug for UploadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSettings")
            .field("project_name", &self.project_name)
            .field("primary_project", &self.primary_project)
            .field("test_repository", &self.test_repository)
            .field("prod_token", &self.prod_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "nightly_token",
                &self.nightly_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Root configuration object for one release run
#[derive(Debug)]
pub struct ReleaseConfig {
    /// Directory holding the built artifact
    pub dist_dir: PathBuf,
    pub metadata_timeout: Duration,
    metadata: Result<PublishCredentials, String>,
    pub upload: UploadSettings,
}

impl ReleaseConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let metadata = read_publish_credentials(&non_empty).map_err(str::to_string);

        let primary_project =
            non_empty(PRIMARY_PROJECT).unwrap_or_else(|| DEFAULT_PRIMARY_PROJECT.to_string());
        let upload = UploadSettings {
            project_name: non_empty(PROJECT_NAME).unwrap_or_else(|| primary_project.clone()),
            primary_project,
            test_repository: non_empty(TEST_REPOSITORY)
                .unwrap_or_else(|| DEFAULT_TEST_REPOSITORY.to_string()),
            prod_token: lookup(PROD_PWD).map(SecretString::from),
            nightly_token: lookup(NIGHT_PWD).map(SecretString::from),
        };

        Self {
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            metadata,
            upload,
        }
    }

    /// Build the configuration from a fixed map of variables
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn with_dist_dir(mut self, dist_dir: impl Into<PathBuf>) -> Self {
        self.dist_dir = dist_dir.into();
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Credentials for the metadata service
    ///
    /// Fails with [`ReleaseError::MissingConfig`] naming the first unset variable.
    pub fn publish_credentials(&self) -> Result<&PublishCredentials, ReleaseError> {
        self.metadata
            .as_ref()
            .map_err(|variable| ReleaseError::MissingConfig {
                variable: variable.clone(),
            })
    }
}

fn read_publish_credentials<F>(non_empty: &F) -> Result<PublishCredentials, &'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint_host = non_empty(METADATA_URL).ok_or(METADATA_URL)?;
    let username = non_empty(METADATA_USERNAME).ok_or(METADATA_USERNAME)?;
    let password = non_empty(METADATA_PASSWORD).ok_or(METADATA_PASSWORD)?;
    Ok(PublishCredentials {
        username,
        password: SecretString::from(password),
        endpoint_host,
    })
}
