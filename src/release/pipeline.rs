//! Release pipeline - runs the publishing steps in their fixed order
//!
//! ExtractCoordinates → PublishMetadata, then SelectCredentials → InvokeUpload.
//! The first failure ends the run; there is no rollback, since the metadata
//! entry and the uploaded artifact have no compensating action.

use crate::core::config::ReleaseConfig;
use crate::core::error::ReleaseError;
use crate::core::state_machine::{ReleaseState, ReleaseStateMachine};
use crate::release::coordinates::{ReleaseCoordinates, extract_coordinates};
use crate::release::metadata::{MetadataAck, MetadataPublisher};
use crate::release::uploader::ArtifactUploader;
use crate::security::CommandRunner;
use std::io::{self, Write};
use tracing::Instrument;
use uuid::Uuid;

/// Which publishing steps a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseSteps {
    /// Metadata then upload
    All,
    MetadataOnly,
    UploadOnly,
}

impl ReleaseSteps {
    fn metadata(&self) -> bool {
        matches!(self, ReleaseSteps::All | ReleaseSteps::MetadataOnly)
    }

    fn upload(&self) -> bool {
        matches!(self, ReleaseSteps::All | ReleaseSteps::UploadOnly)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub run_id: Uuid,
    pub coordinates: Option<ReleaseCoordinates>,
    pub acknowledgement: Option<MetadataAck>,
    pub uploaded: bool,
}

/// Main release orchestrator
///
/// Confirmations are written to `output` (stdout by default) as each step
/// completes, so a later failure never hides an earlier side effect.
pub struct ReleasePipeline<'a> {
    config: &'a ReleaseConfig,
    runner: &'a dyn CommandRunner,
    state_machine: ReleaseStateMachine,
    output: Box<dyn Write + Send + 'a>,
}

impl<'a> ReleasePipeline<'a> {
    pub fn new(config: &'a ReleaseConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            state_machine: ReleaseStateMachine::new(),
            output: Box::new(io::stdout()),
        }
    }

    /// Send confirmations somewhere other than stdout
    pub fn with_output(mut self, output: impl Write + Send + 'a) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn state_machine(&self) -> &ReleaseStateMachine {
        &self.state_machine
    }

    /// Run the selected steps; the first error is recorded and returned
    pub async fn run(&mut self, steps: ReleaseSteps) -> Result<ReleaseReport, ReleaseError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("release", %run_id);

        let result = self.run_steps(run_id, steps).instrument(span).await;

        match &result {
            Ok(_) => self.state_machine.transition(ReleaseState::Success, None),
            Err(error) => {
                tracing::error!(%run_id, code = error.code(), phase = error.phase().as_str(), "release failed");
                self.state_machine.fail(error);
            }
        }
        tracing::debug!(elapsed_ms = self.state_machine.elapsed_ms(), "release run finished");

        result
    }

    async fn run_steps(
        &mut self,
        run_id: Uuid,
        steps: ReleaseSteps,
    ) -> Result<ReleaseReport, ReleaseError> {
        let mut report = ReleaseReport {
            run_id,
            coordinates: None,
            acknowledgement: None,
            uploaded: false,
        };

        if steps.metadata() {
            let (coordinates, ack) = self.publish_metadata().await?;
            report.coordinates = Some(coordinates);
            report.acknowledgement = Some(ack);
        }

        if steps.upload() {
            self.upload_artifact().await?;
            report.uploaded = true;
        }

        Ok(report)
    }

    async fn publish_metadata(&mut self) -> Result<(ReleaseCoordinates, MetadataAck), ReleaseError> {
        let credentials = self.config.publish_credentials()?;

        self.state_machine
            .transition(ReleaseState::ExtractCoordinates, None);
        let coordinates = extract_coordinates(&self.config.dist_dir)?;

        self.state_machine
            .transition(ReleaseState::PublishMetadata, Some(coordinates.to_string()));
        let publisher = MetadataPublisher::with_timeout(credentials, self.config.metadata_timeout)?;
        let ack = publisher.publish(&coordinates).await?;

        self.state_machine
            .transition(ReleaseState::MetadataPublished, None);
        tracing::info!(ack = %ack.message, "metadata service acknowledged release");
        self.emit(&ack.message);

        Ok((coordinates, ack))
    }

    async fn upload_artifact(&mut self) -> Result<(), ReleaseError> {
        let uploader = ArtifactUploader::new(&self.config.upload, &self.config.dist_dir, self.runner);

        self.state_machine.transition(
            ReleaseState::SelectCredentials,
            Some(uploader.channel().as_str().to_string()),
        );
        uploader.select_credentials()?;

        self.state_machine.transition(ReleaseState::InvokeUpload, None);
        uploader.upload().await?;

        self.state_machine.transition(ReleaseState::Uploaded, None);
        self.emit("✅ Artifact uploaded");
        Ok(())
    }

    fn emit(&mut self, line: &str) {
        let written = writeln!(self.output, "{}", line).and_then(|_| self.output.flush());
        if let Err(e) = written {
            tracing::warn!(error = %e, "could not write release output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::test_support::{FakeResponse, MetadataServer, RecordingRunner, SharedOutput};
    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const ARTIFACT: &str = "taichi-1.7.0-cp311-cp311-manylinux_2_27_x86_64.whl";

    fn dist_with_artifact() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(ARTIFACT), b"wheel").unwrap();
        temp_dir
    }

    fn config(dist: &TempDir, host: Option<String>, extra: &[(&str, &str)]) -> ReleaseConfig {
        let mut vars: HashMap<String, String> = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(host) = host {
            vars.insert("METADATA_URL".to_string(), host);
            vars.insert("METADATA_USERNAME".to_string(), "release-bot".to_string());
            vars.insert("METADATA_PASSWORD".to_string(), "hunter2".to_string());
        }
        ReleaseConfig::from_map(&vars).with_dist_dir(dist.path())
    }

    #[tokio::test]
    async fn test_full_release() {
        let dist = dist_with_artifact();
        let server = MetadataServer::start(FakeResponse::ok(r#"{"message": "ok: 1.7.0"}"#)).await;
        let config = config(&dist, Some(server.host()), &[("PROD_PWD", "pypi-prod-token")]);
        let runner = RecordingRunner::exiting_with(0);
        let output = SharedOutput::default();
        let mut pipeline = ReleasePipeline::new(&config, &runner).with_output(output.clone());

        let report = pipeline.run(ReleaseSteps::All).await.unwrap();

        assert_eq!(output.contents(), "ok: 1.7.0\n✅ Artifact uploaded\n");
        assert_eq!(report.acknowledgement.unwrap().message, "ok: 1.7.0");
        assert_eq!(report.coordinates.unwrap().interpreter_tag, "cp311");
        assert!(report.uploaded);
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(pipeline.state_machine().state(), ReleaseState::Success);

        let states: Vec<ReleaseState> = pipeline
            .state_machine()
            .transitions()
            .iter()
            .map(|t| t.to)
            .collect();
        assert_eq!(
            states,
            vec![
                ReleaseState::ExtractCoordinates,
                ReleaseState::PublishMetadata,
                ReleaseState::MetadataPublished,
                ReleaseState::SelectCredentials,
                ReleaseState::InvokeUpload,
                ReleaseState::Uploaded,
                ReleaseState::Success,
            ]
        );
    }

    #[tokio::test]
    async fn test_metadata_failure_stops_before_upload() {
        let dist = dist_with_artifact();
        let server = MetadataServer::start(FakeResponse::status("503 Service Unavailable", "down"))
            .await;
        let config = config(&dist, Some(server.host()), &[("PROD_PWD", "pypi-prod-token")]);
        let runner = RecordingRunner::exiting_with(0);
        let output = SharedOutput::default();
        let mut pipeline = ReleasePipeline::new(&config, &runner).with_output(output.clone());

        let error = pipeline.run(ReleaseSteps::All).await.unwrap_err();

        assert!(matches!(error, ReleaseError::Server { status: 503, .. }));
        assert!(output.contents().is_empty());
        assert!(runner.calls().is_empty());
        assert_eq!(pipeline.state_machine().state(), ReleaseState::Failed);
        assert!(pipeline.state_machine().last_error().unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_timeout_from_config() {
        let dist = dist_with_artifact();
        let server = MetadataServer::start(
            FakeResponse::ok(r#"{"message": "late"}"#).delayed(Duration::from_secs(3)),
        )
        .await;
        let config = config(&dist, Some(server.host()), &[])
            .with_metadata_timeout(Duration::from_millis(200));
        let runner = RecordingRunner::exiting_with(0);
        let mut pipeline = ReleasePipeline::new(&config, &runner);

        assert!(matches!(
            pipeline.run(ReleaseSteps::MetadataOnly).await,
            Err(ReleaseError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_metadata_config() {
        let dist = dist_with_artifact();
        let config = config(&dist, None, &[("PROD_PWD", "pypi-prod-token")]);
        let runner = RecordingRunner::exiting_with(0);
        let mut pipeline = ReleasePipeline::new(&config, &runner);

        match pipeline.run(ReleaseSteps::All).await {
            Err(ReleaseError::MissingConfig { variable }) => assert_eq!(variable, "METADATA_URL"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_artifact_stops_run() {
        let dist = TempDir::new().unwrap();
        fs::write(dist.path().join("taichi-1.7.0.whl"), b"").unwrap();
        let config = config(&dist, Some("127.0.0.1:9".to_string()), &[]);
        let runner = RecordingRunner::exiting_with(0);
        let mut pipeline = ReleasePipeline::new(&config, &runner);

        assert!(matches!(
            pipeline.run(ReleaseSteps::All).await,
            Err(ReleaseError::MalformedFilename { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_only_skips_metadata() {
        let dist = dist_with_artifact();
        let config = config(&dist, None, &[("PROD_PWD", "pypi-prod-token")]);
        let runner = RecordingRunner::exiting_with(0);
        let mut pipeline = ReleasePipeline::new(&config, &runner);

        let report = pipeline.run(ReleaseSteps::UploadOnly).await.unwrap();

        assert!(report.uploaded);
        assert!(report.acknowledgement.is_none());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_after_metadata_success() {
        let dist = dist_with_artifact();
        let server = MetadataServer::start(FakeResponse::ok(r#"{"message": "added"}"#)).await;
        let config = config(&dist, Some(server.host()), &[("PROD_PWD", "pypi-prod-token")]);
        let runner = RecordingRunner::exiting_with(3);
        let output = SharedOutput::default();
        let mut pipeline = ReleasePipeline::new(&config, &runner).with_output(output.clone());

        let error = pipeline.run(ReleaseSteps::All).await.unwrap_err();

        assert!(matches!(error, ReleaseError::UploadFailed { code: 3 }));
        assert_eq!(output.contents(), "added\n");
        assert!(pipeline.state_machine().history().contains("(UPLOAD_FAILED)"));
    }

    #[tokio::test]
    async fn test_acknowledgement_written_before_missing_credential() {
        let dist = dist_with_artifact();
        let server = MetadataServer::start(FakeResponse::ok(r#"{"message": "added 1.7.0"}"#)).await;
        let config = config(&dist, Some(server.host()), &[("PROJECT_NAME", "taichi-nightly")]);
        let runner = RecordingRunner::exiting_with(0);
        let output = SharedOutput::default();
        let mut pipeline = ReleasePipeline::new(&config, &runner).with_output(output.clone());

        assert!(matches!(
            pipeline.run(ReleaseSteps::All).await,
            Err(ReleaseError::MissingCredential { .. })
        ));
        assert_eq!(output.contents(), "added 1.7.0\n");
        assert!(runner.calls().is_empty());
    }
}
