//! Artifact Uploader - pushes the built artifact to the package index via twine
//!
//! The release channel decides both the token and the index:
//!
//! | Project identity     | Token var   | Index                        |
//! |----------------------|-------------|------------------------------|
//! | equals primary name  | `PROD_PWD`  | default (no `--repository`)  |
//! | anything else        | `NIGHT_PWD` | `--repository <test index>`  |

use crate::core::config::{ReleaseChannel, UploadSettings};
use crate::core::error::ReleaseError;
use crate::security::{CommandError, CommandRunner, SecretMasker};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

/// Package-upload tool invoked as a subprocess
pub const UPLOAD_PROGRAM: &str = "twine";

/// Username twine expects when authenticating with an API token
const TOKEN_USERNAME: &str = "__token__";

/// Token and index selection for one upload
pub struct UploadCredentials<'a> {
    pub token: &'a SecretString,
    pub use_test_index: bool,
    /// Environment variable the token came from
    pub variable: &'static str,
}

pub struct ArtifactUploader<'a> {
    settings: &'a UploadSettings,
    dist_dir: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> ArtifactUploader<'a> {
    pub fn new(
        settings: &'a UploadSettings,
        dist_dir: impl AsRef<Path>,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            settings,
            dist_dir: dist_dir.as_ref().to_path_buf(),
            runner,
        }
    }

    pub fn channel(&self) -> ReleaseChannel {
        self.settings.channel()
    }

    /// Pick the token for the current channel
    ///
    /// Fails with [`ReleaseError::MissingCredential`] when the variable is unset
    /// or empty.
    pub fn select_credentials(&self) -> Result<UploadCredentials<'a>, ReleaseError> {
        let channel = self.channel();
        let variable = channel.credential_variable();
        let token =
            self.settings
                .token_for(channel)
                .ok_or_else(|| ReleaseError::MissingCredential {
                    variable: variable.to_string(),
                })?;

        Ok(UploadCredentials {
            token,
            use_test_index: channel.use_test_index(),
            variable,
        })
    }

    /// Arguments for `twine`, token included
    pub fn upload_args(&self, credentials: &UploadCredentials<'_>) -> Vec<String> {
        let mut args = vec!["upload".to_string()];

        if credentials.use_test_index {
            args.push("--repository".to_string());
            args.push(self.settings.test_repository.clone());
        }

        args.extend([
            "--verbose".to_string(),
            "-u".to_string(),
            TOKEN_USERNAME.to_string(),
            "-p".to_string(),
            credentials.token.expose_secret().to_string(),
            // twine expands the glob itself
            format!("{}/*", self.dist_dir.display()),
        ]);

        args
    }

    /// The upload command line with the token masked, for logging
    pub fn display_command(&self, credentials: &UploadCredentials<'_>) -> String {
        let mut masker = SecretMasker::new();
        masker.register(credentials.token);
        masker.mask_command(UPLOAD_PROGRAM, &self.upload_args(credentials))
    }

    /// Select credentials and run the upload tool to completion
    pub async fn upload(&self) -> Result<(), ReleaseError> {
        let credentials = self.select_credentials()?;
        let args = self.upload_args(&credentials);

        let mut masker = SecretMasker::new();
        masker.register(credentials.token);
        tracing::info!(
            channel = self.channel().as_str(),
            token_var = credentials.variable,
            command = %self.display_command(&credentials),
            "uploading artifact"
        );

        let status = self
            .runner
            .run(UPLOAD_PROGRAM, &args)
            .await
            .map_err(|e| match e {
                CommandError::ExecutionFailed(message) => ReleaseError::UploadSpawn {
                    message: masker.mask(&message),
                },
                other => ReleaseError::UploadSpawn {
                    message: other.to_string(),
                },
            })?;

        match status.code {
            Some(0) => Ok(()),
            Some(code) => Err(ReleaseError::UploadFailed { code }),
            None => Err(ReleaseError::UploadTerminated),
        }
    }
}
