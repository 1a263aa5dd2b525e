//! Turning a finished run into what the operator sees and the exit code

use crate::core::error::ReleaseError;
use crate::release::pipeline::ReleaseReport;
use std::fmt::Write as _;

/// Process exit code for a finished run
pub fn exit_code(result: &Result<ReleaseReport, ReleaseError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(error) => error.exit_code(),
    }
}

/// Failure summary for stderr: phase, code, message and suggested actions
pub fn failure_summary(error: &ReleaseError) -> String {
    let mut summary = format!(
        "\n❌ {} failed [{}]\n{}\n",
        error.phase().as_str(),
        error.code(),
        error
    );
    for action in error.suggested_actions() {
        let _ = writeln!(summary, "  - {}", action);
    }
    summary
}
