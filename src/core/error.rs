//! Error handling for release publishing
//!
//! Every failure a release run can hit is a [`ReleaseError`] variant. None of
//! them is retried internally: the binary maps each one to a distinct exit
//! code so the surrounding pipeline can decide whether to retry, alert or abort.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Phase of a release run an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Coordinates,
    Metadata,
    Upload,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Coordinates => "coordinates",
            Phase::Metadata => "metadata",
            Phase::Upload => "upload",
        }
    }
}

/// Main error type for release publishing operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Configuration errors
    #[error("Missing configuration env var {variable}")]
    MissingConfig { variable: String },

    // Coordinate extraction errors
    #[error("Cannot read artifact directory {}: {message}", .path.display())]
    ArtifactDirectory { path: PathBuf, message: String },

    #[error("No artifact found in {}", .path.display())]
    NoArtifact { path: PathBuf },

    #[error("Expected exactly one artifact in {}, found {count}: {}", .path.display(), .names.join(", "))]
    AmbiguousArtifacts {
        path: PathBuf,
        count: usize,
        names: Vec<String>,
    },

    #[error("Malformed artifact filename '{filename}': expected <name>-<version>-<python>-<abi>-<platform>.<ext>")]
    MalformedFilename { filename: String },

    // Metadata publishing errors
    #[error("Updating latest version failed: No internet, cannot reach {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    #[error("Updating latest version failed: Server error, {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Updating latest version failed: Time out when connecting server after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Updating latest version failed: {message}")]
    Request { message: String },

    #[error("Updating latest version failed: unexpected response: {message}")]
    InvalidResponse { message: String },

    // Upload errors
    #[error("Missing password env var {variable}")]
    MissingCredential { variable: String },

    #[error("Twine upload returns error {code}")]
    UploadFailed { code: i32 },

    #[error("Twine upload was terminated without an exit code")]
    UploadTerminated,

    #[error("Twine upload could not be started: {message}")]
    UploadSpawn { message: String },
}

impl ReleaseError {
    /// Get the phase this error was raised in
    pub fn phase(&self) -> Phase {
        match self {
            Self::MissingConfig { .. } => Phase::Config,
            Self::ArtifactDirectory { .. }
            | Self::NoArtifact { .. }
            | Self::AmbiguousArtifacts { .. }
            | Self::MalformedFilename { .. } => Phase::Coordinates,
            Self::Connectivity { .. }
            | Self::Server { .. }
            | Self::Timeout { .. }
            | Self::Request { .. }
            | Self::InvalidResponse { .. } => Phase::Metadata,
            Self::MissingCredential { .. }
            | Self::UploadFailed { .. }
            | Self::UploadTerminated
            | Self::UploadSpawn { .. } => Phase::Upload,
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "MISSING_CONFIG",
            Self::ArtifactDirectory { .. } => "ARTIFACT_DIRECTORY",
            Self::NoArtifact { .. } => "NO_ARTIFACT",
            Self::AmbiguousArtifacts { .. } => "AMBIGUOUS_ARTIFACTS",
            Self::MalformedFilename { .. } => "MALFORMED_FILENAME",
            Self::Connectivity { .. } => "CONNECTIVITY_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::Request { .. } => "REQUEST_ERROR",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::MissingCredential { .. } => "MISSING_CREDENTIAL",
            Self::UploadFailed { .. } => "UPLOAD_FAILED",
            Self::UploadTerminated => "UPLOAD_TERMINATED",
            Self::UploadSpawn { .. } => "UPLOAD_SPAWN",
        }
    }

    /// Process exit code for this error
    ///
    /// Each class of failure gets its own code so a release pipeline can
    /// branch on it without parsing messages. 1 is left for unexpected errors
    /// and 2 for clap's usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingConfig { .. } => 12,
            Self::ArtifactDirectory { .. }
            | Self::NoArtifact { .. }
            | Self::AmbiguousArtifacts { .. }
            | Self::MalformedFilename { .. } => 3,
            Self::Connectivity { .. } => 4,
            Self::Server { .. } => 5,
            Self::Timeout { .. } => 6,
            Self::Request { .. } => 7,
            Self::InvalidResponse { .. } => 8,
            Self::MissingCredential { .. } => 9,
            Self::UploadFailed { .. } | Self::UploadTerminated => 10,
            Self::UploadSpawn { .. } => 11,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingConfig { .. } => vec![
                "Set METADATA_URL, METADATA_USERNAME and METADATA_PASSWORD in the job environment",
            ],
            Self::ArtifactDirectory { .. } | Self::NoArtifact { .. } => vec![
                "Check that the build step wrote its artifact to the dist directory",
                "Pass --dist-dir if the artifact lives elsewhere",
            ],
            Self::AmbiguousArtifacts { .. } => vec![
                "Publish one artifact per run",
                "Clean the dist directory before building",
            ],
            Self::MalformedFilename { .. } => {
                vec!["Check the artifact name follows the wheel naming convention"]
            }
            Self::Connectivity { .. } => vec![
                "Check the network path to the metadata service",
                "Check METADATA_URL",
            ],
            Self::Server { .. } => vec![
                "Check the metadata service logs",
                "Check METADATA_USERNAME and METADATA_PASSWORD",
            ],
            Self::Timeout { .. } => vec![
                "Check the metadata service health",
                "Use --timeout-secs to allow a longer response time",
            ],
            Self::Request { .. } | Self::InvalidResponse { .. } => {
                vec!["Check METADATA_URL points at the metadata service"]
            }
            Self::MissingCredential { .. } => {
                vec!["Set PROD_PWD or NIGHT_PWD for the selected release channel"]
            }
            Self::UploadFailed { .. } | Self::UploadTerminated => vec![
                "Check the twine output above",
                "The index rejects re-uploads of an existing version",
            ],
            Self::UploadSpawn { .. } => vec!["Install twine in the release environment"],
        }
    }
}
