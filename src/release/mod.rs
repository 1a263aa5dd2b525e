pub mod coordinates;
pub mod metadata;
pub mod outcome;
pub mod pipeline;
pub mod uploader;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinates::{ReleaseCoordinates, extract_coordinates, locate_artifact};
pub use metadata::{MetadataAck, MetadataPublisher};
pub use outcome::{exit_code, failure_summary};
pub use pipeline::{ReleasePipeline, ReleaseReport, ReleaseSteps};
pub use uploader::{ArtifactUploader, UPLOAD_PROGRAM, UploadCredentials};
