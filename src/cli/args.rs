//! Defines the command-line arguments for the sytest CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::{BackendKind, Timeouts};
use crate::config::Toolchains;
use crate::pipeline::PipelineConfig;
use crate::runner::{Group, RunOptions};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sytest",
    version,
    about = "Compile, build and run SysY test cases and compare them against golden output."
)]
pub struct SytestArgs {
    /// Test case group to run.
    #[arg(long, value_enum, default_value_t = Group::Basic)]
    pub group: Group,

    /// Testing stage (backend).
    #[arg(long, value_enum, default_value_t = BackendKind::Llvm)]
    pub stage: BackendKind,

    /// Optimization level passed to the compiler.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub opt: u8,

    /// The compiler under test.
    #[arg(long, default_value = "bin/compiler")]
    pub compiler: PathBuf,

    /// Directory containing the test case groups.
    #[arg(long, default_value = "testcase/functional")]
    pub testcases: PathBuf,

    /// Directory for artifacts and captured output.
    #[arg(long, default_value = "test_output")]
    pub output_dir: PathBuf,

    /// Toolchain configuration file (KEY=VALUE lines).
    #[arg(long, default_value = "toolchains.conf")]
    pub toolchains: PathBuf,

    /// Directory holding the sysy support libraries.
    #[arg(long, default_value = "lib")]
    pub lib_dir: PathBuf,

    /// Compile deadline in seconds.
    #[arg(long, default_value_t = 30)]
    pub compile_timeout: u64,

    /// Native execution deadline in seconds.
    #[arg(long, default_value_t = 60)]
    pub exec_timeout: u64,

    /// Emulated execution deadline in seconds.
    #[arg(long, default_value_t = 60)]
    pub emu_timeout: u64,

    /// How progress is reported.
    #[arg(long, value_enum, default_value_t = Format::Human)]
    pub format: Format,

    /// Print a line diff for wrong answers.
    #[arg(long)]
    pub show_diff: bool,

    /// Keep the compiler's artifact in the output directory.
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Print the effective toolchain configuration and exit.
    #[arg(long)]
    pub show_config: bool,
}

/// Output formats for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Status lines on the terminal.
    Human,
    /// One JSON object per event.
    Json,
}

impl SytestArgs {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            compile: Duration::from_secs(self.compile_timeout),
            execute: Duration::from_secs(self.exec_timeout),
            emulated: Duration::from_secs(self.emu_timeout),
        }
    }

    /// Builds the run options, with `toolchains` already loaded.
    pub fn run_options(&self, toolchains: Toolchains) -> RunOptions {
        RunOptions {
            testcases: self.testcases.clone(),
            group: self.group,
            backend: self.stage,
            opt_level: self.opt,
            pipeline: PipelineConfig {
                compiler: self.compiler.clone(),
                lib_dir: self.lib_dir.clone(),
                output_dir: self.output_dir.clone(),
                toolchains,
                timeouts: self.timeouts(),
                keep_artifacts: self.keep_artifacts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_repository_layout() {
        let args = SytestArgs::try_parse_from(["sytest"]).unwrap();
        assert_eq!(args.group, Group::Basic);
        assert_eq!(args.stage, BackendKind::Llvm);
        assert_eq!(args.opt, 0);
        assert_eq!(args.timeouts(), Timeouts::default());

        let options = args.run_options(Toolchains::default());
        assert_eq!(options.group_dir(), PathBuf::from("testcase/functional/Basic"));
        assert_eq!(options.pipeline.compiler, PathBuf::from("bin/compiler"));
    }

    #[test]
    fn parses_group_stage_and_level() {
        let args = SytestArgs::try_parse_from([
            "sytest", "--group", "Advanced", "--stage", "riscv", "--opt", "2",
        ])
        .unwrap();
        assert_eq!(args.group, Group::Advanced);
        assert_eq!(args.stage, BackendKind::Riscv);
        assert_eq!(args.opt, 2);
    }

    #[test]
    fn arm_parses_but_unknown_stages_do_not() {
        let args = SytestArgs::try_parse_from(["sytest", "--stage", "arm"]).unwrap();
        assert_eq!(args.stage, BackendKind::Arm);
        assert!(SytestArgs::try_parse_from(["sytest", "--stage", "mips"]).is_err());
    }

    #[test]
    fn descriptive_aliases_select_the_same_values() {
        let args = SytestArgs::try_parse_from([
            "sytest", "--group", "AdvancedGroup", "--stage", "target",
        ])
        .unwrap();
        assert_eq!(args.group, Group::Advanced);
        assert_eq!(args.stage, BackendKind::Riscv);

        let args = SytestArgs::try_parse_from([
            "sytest", "--group", "BasicGroup", "--stage", "intermediate",
        ])
        .unwrap();
        assert_eq!(args.group, Group::Basic);
        assert_eq!(args.stage, BackendKind::Llvm);
    }

    #[test]
    fn optimization_level_is_bounded() {
        assert!(SytestArgs::try_parse_from(["sytest", "--opt", "3"]).is_err());
    }

    #[test]
    fn emulated_deadline_is_independent() {
        let args = SytestArgs::try_parse_from(["sytest", "--emu-timeout", "180"]).unwrap();
        let t = args.timeouts();
        assert_eq!(t.emulated, Duration::from_secs(180));
        assert_eq!(t.execute, Duration::from_secs(60));
    }
}
