pub mod core;
pub mod release;
pub mod security;

pub use self::core::*;
pub use release::{
    ArtifactUploader, MetadataAck, MetadataPublisher, ReleaseCoordinates, ReleasePipeline,
    ReleaseReport, ReleaseSteps,
};
pub use security::{CommandError, CommandRunner, SafeCommandExecutor, SecretMasker};
