//! Release coordinates extracted from the built artifact's filename
//!
//! The dist directory must hold exactly one artifact. Its name is parsed with
//! an explicit pattern, `<name>-<version>-<python>-<abi>-<platform>[-...].<ext>`,
//! where `<ext>` is a three-character extension such as `whl`.

use crate::core::error::ReleaseError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref ARTIFACT_FILENAME: Regex = Regex::new(
        r"^(?P<name>[^-]*)-(?P<version>[^-]+)-(?P<python>[^-]+)-(?P<abi>[^-]*)-(?P<platform>[^-]+)(?:-[^-]*)*\.(?P<ext>[^-.]{3})$"
    )
    .expect("artifact filename pattern is valid");
}

/// Version, interpreter tag and platform tag of one release
///
/// Serializes to the metadata service payload `{version, platform, python}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCoordinates {
    pub version: String,
    #[serde(rename = "platform")]
    pub platform_tag: String,
    #[serde(rename = "python")]
    pub interpreter_tag: String,
}

impl ReleaseCoordinates {
    /// Parse coordinates from an artifact filename
    ///
    /// # Examples
    ///
    /// ```
    /// use release_publisher::release::ReleaseCoordinates;
    ///
    /// let coords = ReleaseCoordinates::from_filename("pkg-1.2.3-cp39-linux-x86_64.whl").unwrap();
    /// assert_eq!(coords.version, "1.2.3");
    /// assert_eq!(coords.interpreter_tag, "cp39");
    /// assert_eq!(coords.platform_tag, "x86_64");
    /// ```
    pub fn from_filename(filename: &str) -> Result<Self, ReleaseError> {
        let captures =
            ARTIFACT_FILENAME
                .captures(filename)
                .ok_or_else(|| ReleaseError::MalformedFilename {
                    filename: filename.to_string(),
                })?;

        Ok(Self {
            version: captures["version"].to_string(),
            platform_tag: captures["platform"].to_string(),
            interpreter_tag: captures["python"].to_string(),
        })
    }
}

impl fmt::Display for ReleaseCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} python={} platform={}",
            self.version, self.interpreter_tag, self.platform_tag
        )
    }
}

/// Find the single artifact directly inside `dist_dir`
///
/// Hidden files and subdirectories are ignored. Zero or several candidates
/// is an error; the choice never depends on directory listing order.
pub fn locate_artifact(dist_dir: &Path) -> Result<(PathBuf, String), ReleaseError> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(dist_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ReleaseError::ArtifactDirectory {
            path: dist_dir.to_path_buf(),
            message: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        if entry.file_name().to_str().is_none() {
            return Err(ReleaseError::MalformedFilename { filename: name });
        }

        artifacts.push((entry.into_path(), name));
    }

    match artifacts.len() {
        0 => Err(ReleaseError::NoArtifact {
            path: dist_dir.to_path_buf(),
        }),
        1 => Ok(artifacts.remove(0)),
        count => {
            let mut names: Vec<String> = artifacts.into_iter().map(|(_, name)| name).collect();
            names.sort();
            Err(ReleaseError::AmbiguousArtifacts {
                path: dist_dir.to_path_buf(),
                count,
                names,
            })
        }
    }
}

/// Locate the artifact in `dist_dir` and parse its coordinates
pub fn extract_coordinates(dist_dir: &Path) -> Result<ReleaseCoordinates, ReleaseError> {
    let (path, name) = locate_artifact(dist_dir)?;
    tracing::info!(artifact = %path.display(), "found release artifact");

    ReleaseCoordinates::from_filename(&name)
}
