//! Harness-fatal errors.
//!
//! Failures of an individual test case are never errors: they are reported as
//! a [`Verdict`](crate::pipeline::Verdict) and the batch moves on. The types in
//! this module cover the handful of conditions that stop a run before any case
//! executes, and are rendered through `miette` at the CLI boundary.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// An error that aborts the whole run.
#[derive(Error, Diagnostic, Debug)]
pub enum HarnessError {
    #[error("Test directory not found: {}", path.display())]
    #[diagnostic(
        code(sytest::missing_test_dir),
        help("pass --testcases to point at the directory holding the Basic/Advanced groups")
    )]
    MissingTestDir { path: PathBuf },

    #[error("Backend '{name}' is not implemented")]
    #[diagnostic(code(sytest::unsupported_backend), help("supported backends: llvm, riscv"))]
    UnsupportedBackend { name: String },

    #[error(
        "Cannot order test case '{}': file name does not start with a decimal integer",
        path.display()
    )]
    #[diagnostic(
        code(sytest::unordered_case),
        help("rename the case so it begins with its sequence number, e.g. 12_while.sy")
    )]
    UnorderedCase { path: PathBuf },

    #[error("Failed to prepare output directory {}", path.display())]
    #[diagnostic(code(sytest::output_dir))]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to enumerate test cases")]
    #[diagnostic(code(sytest::discovery))]
    Discovery(#[from] walkdir::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_message_names_the_path() {
        let err = HarnessError::MissingTestDir {
            path: PathBuf::from("testcase/functional/Basic"),
        };
        assert_eq!(
            err.to_string(),
            "Test directory not found: testcase/functional/Basic"
        );
    }

    #[test]
    fn diagnostics_carry_codes() {
        let err = HarnessError::UnsupportedBackend { name: "arm".into() };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("sytest::unsupported_backend"));
    }
}
