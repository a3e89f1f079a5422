//! Backend selection.
//!
//! A backend fixes which stages a case goes through and which external
//! commands implement them. Two are implemented:
//!
//! - `llvm`: the compiler emits textual IR, which is validated, lowered with
//!   the host compiler, statically linked against `libsysy_x86` and run
//!   natively.
//! - `riscv`: the compiler emits RISC-V assembly, which is assembled and
//!   linked by the cross toolchain against `libsysy_riscv` at a fixed load
//!   address, then run under a user-mode emulator.
//!
//! `arm` is accepted on the command line but rejected before any case runs.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::config::Toolchains;
use crate::discovery::TestCase;
use crate::errors::HarnessError;
use crate::process::Invocation;

/// Backend names accepted by `--stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[value(alias = "intermediate")]
    Llvm,
    #[value(alias = "target")]
    Riscv,
    /// Reserved; not implemented.
    Arm,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Llvm => "llvm",
            BackendKind::Riscv => "riscv",
            BackendKind::Arm => "arm",
        };
        f.write_str(name)
    }
}

/// One step of a case's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    CheckSyntax,
    Assemble,
    Link,
    Execute,
}

/// Per-stage-class deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub compile: Duration,
    pub execute: Duration,
    /// Execution under the emulator.
    pub emulated: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            compile: Duration::from_secs(30),
            execute: Duration::from_secs(60),
            emulated: Duration::from_secs(60),
        }
    }
}

/// Everything a backend needs to spell out a stage's command line.
#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    pub compiler: &'a Path,
    pub lib_dir: &'a Path,
    pub toolchains: &'a Toolchains,
    pub case: &'a TestCase,
    pub object: &'a Path,
    pub binary: &'a Path,
}

/// An implemented backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Llvm,
    RiscV,
}

const LLVM_BUILD: &[Stage] = &[Stage::Compile, Stage::CheckSyntax, Stage::Assemble, Stage::Link];

const RISCV_BUILD: &[Stage] = &[Stage::Compile, Stage::Assemble, Stage::Link];

impl Backend {
    /// Maps a requested backend to an implementation, rejecting reserved ones.
    pub fn select(kind: BackendKind) -> Result<Self, HarnessError> {
        match kind {
            BackendKind::Llvm => Ok(Backend::Llvm),
            BackendKind::Riscv => Ok(Backend::RiscV),
            BackendKind::Arm => Err(HarnessError::UnsupportedBackend {
                name: kind.to_string(),
            }),
        }
    }

    pub fn kind(self) -> BackendKind {
        match self {
            Backend::Llvm => BackendKind::Llvm,
            Backend::RiscV => BackendKind::Riscv,
        }
    }

    /// Stages that turn a source file into an executable. Every backend
    /// then finishes with [`Stage::Execute`].
    pub fn build_stages(self) -> &'static [Stage] {
        match self {
            Backend::Llvm => LLVM_BUILD,
            Backend::RiscV => RISCV_BUILD,
        }
    }

    /// Extension of the compiler's output, including the dot.
    pub fn artifact_ext(self) -> &'static str {
        match self {
            Backend::Llvm => ".ll",
            Backend::RiscV => ".s",
        }
    }

    /// Compiler flag selecting the output kind.
    pub fn emit_flag(self) -> &'static str {
        match self {
            Backend::Llvm => "-llvm",
            Backend::RiscV => "-S",
        }
    }

    pub fn support_library(self) -> &'static str {
        match self {
            Backend::Llvm => "sysy_x86",
            Backend::RiscV => "sysy_riscv",
        }
    }

    pub fn is_emulated(self) -> bool {
        matches!(self, Backend::RiscV)
    }

    /// In-progress status text for `stage`.
    pub fn label(self, stage: Stage) -> &'static str {
        match (self, stage) {
            (Backend::Llvm, Stage::Compile) => "Compiling sy to ir",
            (Backend::RiscV, Stage::Compile) => "Compiling sy to asm",
            (_, Stage::CheckSyntax) => "Checking IR syntax",
            (Backend::Llvm, Stage::Assemble) => "Compiling ir to object",
            (Backend::RiscV, Stage::Assemble) => "Compiling asm to object",
            (_, Stage::Link) => "Linking object to exec",
            (_, Stage::Execute) => "Executing",
        }
    }

    /// Deadline for `stage`; stages without one run until they exit.
    pub fn deadline(self, stage: Stage, timeouts: &Timeouts) -> Option<Duration> {
        match stage {
            Stage::Compile => Some(timeouts.compile),
            Stage::Execute if self.is_emulated() => Some(timeouts.emulated),
            Stage::Execute => Some(timeouts.execute),
            Stage::CheckSyntax | Stage::Assemble | Stage::Link => None,
        }
    }

    /// The command for `stage`, with its deadline but without stdio wiring.
    pub fn invocation(
        self,
        stage: Stage,
        inputs: &StageInputs<'_>,
        timeouts: &Timeouts,
    ) -> Invocation {
        let invocation = self.command(stage, inputs);
        match self.deadline(stage, timeouts) {
            Some(deadline) => invocation.deadline(deadline),
            None => invocation,
        }
    }

    fn command(self, stage: Stage, inputs: &StageInputs<'_>) -> Invocation {
        let tc = inputs.toolchains;
        let artifact = inputs.case.artifact.as_path();
        match (self, stage) {
            (_, Stage::Compile) => Invocation::new(inputs.compiler)
                .arg(&inputs.case.source)
                .arg(self.emit_flag())
                .arg("-o")
                .arg(artifact)
                .arg(format!("-O{}", inputs.case.opt_level)),
            (_, Stage::CheckSyntax) => Invocation::new(&tc.llvm_as)
                .arg(artifact)
                .args(["-o", "/dev/null"]),
            (Backend::Llvm, Stage::Assemble) => Invocation::new(&tc.clang)
                .arg(artifact)
                .args(["-c", "-o"])
                .arg(inputs.object)
                .arg("-w"),
            (Backend::RiscV, Stage::Assemble) => Invocation::new(&tc.riscv_gcc)
                .arg(artifact)
                .args(["-c", "-o"])
                .arg(inputs.object)
                .arg("-w"),
            (Backend::Llvm, Stage::Link) => Invocation::new(&tc.clang)
                .arg(inputs.object)
                .arg("-o")
                .arg(inputs.binary)
                .arg("-static")
                .arg(lib_search_flag(inputs.lib_dir))
                .arg(format!("-l{}", self.support_library())),
            (Backend::RiscV, Stage::Link) => Invocation::new(&tc.riscv_gcc)
                .arg(inputs.object)
                .arg("-o")
                .arg(inputs.binary)
                .arg(lib_search_flag(inputs.lib_dir))
                .arg(format!("-l{}", self.support_library()))
                .args(["-static", "-mcmodel=medany"])
                .arg(format!("-Wl,--no-relax,-Ttext={}", tc.text_addr)),
            (Backend::Llvm, Stage::Execute) => Invocation::new(inputs.binary),
            (Backend::RiscV, Stage::Execute) => Invocation::new(&tc.qemu).arg(inputs.binary),
        }
    }
}

fn lib_search_flag(lib_dir: &Path) -> OsString {
    let mut flag = OsString::from("-L");
    flag.push(lib_dir);
    flag
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixture {
        toolchains: Toolchains,
        case: TestCase,
        object: PathBuf,
        binary: PathBuf,
    }

    impl Fixture {
        fn new(backend: Backend) -> Self {
            Self {
                toolchains: Toolchains::default(),
                case: TestCase::new(
                    Path::new("cases/1_add.sy"),
                    Path::new("out"),
                    backend.artifact_ext(),
                    1,
                ),
                object: PathBuf::from("scratch/1_add.o"),
                binary: PathBuf::from("scratch/1_add.bin"),
            }
        }

        fn inputs(&self) -> StageInputs<'_> {
            StageInputs {
                compiler: Path::new("bin/compiler"),
                lib_dir: Path::new("lib"),
                toolchains: &self.toolchains,
                case: &self.case,
                object: &self.object,
                binary: &self.binary,
            }
        }
    }

    fn argv(inv: &Invocation) -> Vec<String> {
        std::iter::once(inv.program())
            .chain(inv.arguments().iter().map(|a| a.as_os_str()))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn arm_is_rejected() {
        assert!(matches!(
            Backend::select(BackendKind::Arm),
            Err(HarnessError::UnsupportedBackend { name }) if name == "arm"
        ));
        assert_eq!(Backend::select(BackendKind::Llvm).unwrap(), Backend::Llvm);
        assert_eq!(Backend::select(BackendKind::Riscv).unwrap(), Backend::RiscV);
    }

    #[test]
    fn only_the_ir_path_checks_syntax() {
        assert!(Backend::Llvm.build_stages().contains(&Stage::CheckSyntax));
        assert!(!Backend::RiscV.build_stages().contains(&Stage::CheckSyntax));
        for backend in [Backend::Llvm, Backend::RiscV] {
            assert_eq!(backend.build_stages().first(), Some(&Stage::Compile));
            assert_eq!(backend.build_stages().last(), Some(&Stage::Link));
            assert!(!backend.build_stages().contains(&Stage::Execute));
        }
    }

    #[test]
    fn compile_command_passes_mode_output_and_level() {
        let fx = Fixture::new(Backend::RiscV);
        let inv = Backend::RiscV.invocation(Stage::Compile, &fx.inputs(), &Timeouts::default());
        assert_eq!(
            argv(&inv),
            ["bin/compiler", "cases/1_add.sy", "-S", "-o", "out/1_add-O1.s", "-O1"]
        );
        assert_eq!(inv.deadline_value(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn ir_link_is_static_against_host_library() {
        let fx = Fixture::new(Backend::Llvm);
        let inv = Backend::Llvm.invocation(Stage::Link, &fx.inputs(), &Timeouts::default());
        assert_eq!(
            argv(&inv),
            [
                "clang",
                "scratch/1_add.o",
                "-o",
                "scratch/1_add.bin",
                "-static",
                "-Llib",
                "-lsysy_x86",
            ]
        );
        assert_eq!(inv.deadline_value(), None);
    }

    #[test]
    fn riscv_link_places_text_at_configured_address() {
        let mut fx = Fixture::new(Backend::RiscV);
        fx.toolchains.text_addr = "0x80000000".into();
        let inv = Backend::RiscV.invocation(Stage::Link, &fx.inputs(), &Timeouts::default());
        let args = argv(&inv);
        assert_eq!(args[0], "riscv64-unknown-elf-gcc");
        assert!(args.contains(&"-lsysy_riscv".to_string()));
        assert!(args.contains(&"-mcmodel=medany".to_string()));
        assert_eq!(args.last().unwrap(), "-Wl,--no-relax,-Ttext=0x80000000");
    }

    #[test]
    fn emulated_execution_uses_its_own_deadline() {
        let timeouts = Timeouts {
            compile: Duration::from_secs(1),
            execute: Duration::from_secs(2),
            emulated: Duration::from_secs(9),
        };
        let fx = Fixture::new(Backend::RiscV);
        let inv = Backend::RiscV.invocation(Stage::Execute, &fx.inputs(), &timeouts);
        assert_eq!(argv(&inv), ["qemu-riscv64", "scratch/1_add.bin"]);
        assert_eq!(inv.deadline_value(), Some(Duration::from_secs(9)));

        let fx = Fixture::new(Backend::Llvm);
        let inv = Backend::Llvm.invocation(Stage::Execute, &fx.inputs(), &timeouts);
        assert_eq!(argv(&inv), ["scratch/1_add.bin"]);
        assert_eq!(inv.deadline_value(), Some(Duration::from_secs(2)));
    }
}
