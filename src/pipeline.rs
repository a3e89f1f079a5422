//! Per-case execution pipeline.
//!
//! A case moves through its backend's build stages, then is executed and its
//! captured output compared against the golden file:
//!
//! 1. **Compile**: source to IR or assembly, under the compile deadline
//! 2. **Check syntax** (IR only): validate the IR independently
//! 3. **Assemble**: artifact to object file
//! 4. **Link**: object to a static executable against the support library
//! 5. **Execute**: run natively or under the emulator, under the execute deadline
//! 6. **Compare**: append the exit code to the captured stdout and diff it
//!    against the golden file
//!
//! The first failing stage decides the [`Verdict`]. All scratch files a case
//! creates are gone by the time [`Pipeline::run_case`] returns, whatever the
//! verdict.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

use crate::backend::{Backend, Stage, StageInputs, Timeouts};
use crate::config::Toolchains;
use crate::discovery::TestCase;
use crate::golden::{append_exit_code, compare_files, Comparison, Mismatch};
use crate::process::Outcome;
use crate::report::{Event, Reporter};

// =============================================================================
// CORE TYPES
// =============================================================================

/// Terminal result of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    CompilerError,
    CompileTimeExceeded,
    SyntaxError,
    AssembleError,
    LinkError,
    RuntimeCrash,
    ExecuteTimeExceeded,
    IoError,
    WrongAnswer,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }

    /// Status text shown for this verdict.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::CompilerError => "Compiler Error",
            Verdict::CompileTimeExceeded => "Compile Time Limit Exceed",
            Verdict::SyntaxError => "IR Syntax Error",
            Verdict::AssembleError => "Assembly Error",
            Verdict::LinkError => "Link Error",
            Verdict::RuntimeCrash => "Runtime Error (Segmentation Fault)",
            Verdict::ExecuteTimeExceeded => "Execute Time Limit Exceed",
            Verdict::IoError => "IO Error",
            Verdict::WrongAnswer => "Wrong Answer",
        }
    }

    /// Classifies the outcome of a build stage; `None` means carry on.
    pub fn for_build_stage(stage: Stage, outcome: &Outcome) -> Option<Self> {
        if outcome.success() {
            return None;
        }
        Some(match (stage, outcome) {
            (Stage::Compile, Outcome::TimedOut) => Verdict::CompileTimeExceeded,
            (Stage::Compile, _) => Verdict::CompilerError,
            (Stage::CheckSyntax, _) => Verdict::SyntaxError,
            (Stage::Assemble, _) => Verdict::AssembleError,
            (Stage::Link, _) => Verdict::LinkError,
            (Stage::Execute, _) => Verdict::IoError,
        })
    }

    /// Classifies the outcome of running the program. `Ok` carries the
    /// status to compare against the golden file.
    pub fn for_execution(outcome: &Outcome) -> Result<i32, Self> {
        match outcome {
            Outcome::TimedOut => Err(Verdict::ExecuteTimeExceeded),
            Outcome::NotFound | Outcome::SpawnFailed(_) => Err(Verdict::IoError),
            o if o.is_fault() => Err(Verdict::RuntimeCrash),
            o => Ok(o.status_code()),
        }
    }
}

/// What the pipeline concluded about a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub verdict: Verdict,
    /// Present for wrong answers.
    pub mismatch: Option<Mismatch>,
}

impl From<Verdict> for CaseResult {
    fn from(verdict: Verdict) -> Self {
        Self {
            verdict,
            mismatch: None,
        }
    }
}

/// Settings shared by every case of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The compiler under test.
    pub compiler: PathBuf,
    /// Directory holding the support libraries.
    pub lib_dir: PathBuf,
    /// Directory for artifacts, captured output and per-case scratch dirs.
    pub output_dir: PathBuf,
    pub toolchains: Toolchains,
    pub timeouts: Timeouts,
    /// Keep the compiler's artifact after the case ends.
    pub keep_artifacts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("bin/compiler"),
            lib_dir: PathBuf::from("lib"),
            output_dir: PathBuf::from("test_output"),
            toolchains: Toolchains::default(),
            timeouts: Timeouts::default(),
            keep_artifacts: false,
        }
    }
}

// =============================================================================
// SCRATCH
// =============================================================================

/// Files owned by one case. The object file and executable live in a private
/// temporary directory; the artifact and captured output are removed on drop.
struct Scratch {
    _dir: TempDir,
    object: PathBuf,
    binary: PathBuf,
    owned: Vec<PathBuf>,
}

impl Scratch {
    fn create(output_dir: &Path, case: &TestCase, keep_artifacts: bool) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!(".{}-", case.name))
            .tempdir_in(output_dir)?;
        let object = dir.path().join(format!("{}.o", case.name));
        let binary = dir.path().join(format!("{}.bin", case.name));
        let mut owned = vec![case.actual.clone()];
        if !keep_artifacts {
            owned.push(case.artifact.clone());
        }
        Ok(Self {
            _dir: dir,
            object,
            binary,
            owned,
        })
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.owned {
            let _ = fs::remove_file(path);
        }
        // The object and executable go with `_dir`.
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Runs cases for one backend.
pub struct Pipeline<'a> {
    backend: Backend,
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: Backend, config: &'a PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Runs `case` to its verdict, reporting each stage as it starts and the
    /// verdict at the end.
    pub fn run_case(&self, case: &TestCase, reporter: &mut dyn Reporter) -> CaseResult {
        let display = case.display_name();
        let result = self.run_stages(case, &display, reporter);
        reporter.report(&Event::CaseFinished {
            case: &display,
            verdict: result.verdict,
            mismatch: result.mismatch.as_ref(),
        });
        result
    }

    fn run_stages(
        &self,
        case: &TestCase,
        display: &str,
        reporter: &mut dyn Reporter,
    ) -> CaseResult {
        let output_dir = &self.config.output_dir;
        let scratch = match Scratch::create(output_dir, case, self.config.keep_artifacts) {
            Ok(scratch) => scratch,
            Err(_) => return Verdict::IoError.into(),
        };
        let inputs = StageInputs {
            compiler: &self.config.compiler,
            lib_dir: &self.config.lib_dir,
            toolchains: &self.config.toolchains,
            case,
            object: &scratch.object,
            binary: &scratch.binary,
        };

        for &stage in self.backend.build_stages() {
            self.enter(display, stage, reporter);
            let outcome = self
                .backend
                .invocation(stage, &inputs, &self.config.timeouts)
                .run();
            if let Some(verdict) = Verdict::for_build_stage(stage, &outcome) {
                return verdict.into();
            }
        }

        self.enter(display, Stage::Execute, reporter);
        let status = match self.execute(case, &inputs) {
            Ok(status) => status,
            Err(verdict) => return verdict.into(),
        };
        self.compare(case, status)
    }

    fn enter(&self, display: &str, stage: Stage, reporter: &mut dyn Reporter) {
        reporter.report(&Event::StageEntered {
            case: display,
            stage,
            label: self.backend.label(stage),
        });
    }

    /// Runs the executable with the case's stdin, capturing stdout.
    fn execute(&self, case: &TestCase, inputs: &StageInputs<'_>) -> Result<i32, Verdict> {
        let stdout = File::create(&case.actual).map_err(|_| Verdict::IoError)?;
        let mut invocation = self
            .backend
            .invocation(Stage::Execute, inputs, &self.config.timeouts)
            .stdout(stdout);
        if let Some(stdin) = &case.stdin {
            let file = File::open(stdin).map_err(|_| Verdict::IoError)?;
            invocation = invocation.stdin(file);
        }
        Verdict::for_execution(&invocation.run())
    }

    /// Appends `status` to the captured output and checks it against the
    /// golden file. The captured output is removed whatever the result.
    fn compare(&self, case: &TestCase, status: i32) -> CaseResult {
        let comparison = append_exit_code(&case.actual, status)
            .and_then(|()| compare_files(&case.actual, &case.expected));
        let _ = fs::remove_file(&case.actual);
        match comparison {
            Ok(Comparison::Match) => Verdict::Accepted.into(),
            Ok(Comparison::Mismatch(mismatch)) => CaseResult {
                verdict: Verdict::WrongAnswer,
                mismatch: Some(mismatch),
            },
            Err(_) => Verdict::IoError.into(),
        }
    }
}
