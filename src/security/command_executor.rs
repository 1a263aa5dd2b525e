//! SafeCommandExecutor: whitelisted execution of the package-upload tool
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved commands can execute
//! - **Injection prevention**: Arguments go straight to the process, never through a shell
//! - **Working directory validation**: Validates existence before execution
//!
//! The [`CommandRunner`] trait is the seam the uploader talks to, so the
//! upload logic can be exercised without spawning anything.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Allowed commands whitelist.
const ALLOWED_COMMANDS: &[&str] = &["twine"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Exit status of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, inheriting stdout/stderr, and wait for it
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandStatus, CommandError>;
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self { working_dir })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandStatus, CommandError> {
        if !ALLOWED_COMMANDS.contains(&program) {
            return Err(CommandError::CommandNotAllowed(program.to_string()));
        }

        // No timeout: the upload tool owns its own network timeouts.
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .status()
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}
