//! Batch orchestration: one (group, backend, opt level) run.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;

use crate::backend::{Backend, BackendKind};
use crate::discovery::{CaseDiscoverer, TestCase};
use crate::errors::HarnessError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::report::{Event, Reporter, RunSummary};

/// Test case groups, each a subdirectory of the test case root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Group {
    #[value(name = "Basic", alias = "BasicGroup")]
    Basic,
    #[value(name = "Advanced", alias = "AdvancedGroup")]
    Advanced,
}

impl Group {
    pub fn dir_name(self) -> &'static str {
        match self {
            Group::Basic => "Basic",
            Group::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory containing the group directories.
    pub testcases: PathBuf,
    pub group: Group,
    pub backend: BackendKind,
    pub opt_level: u8,
    pub pipeline: PipelineConfig,
}

impl RunOptions {
    pub fn group_dir(&self) -> PathBuf {
        self.testcases.join(self.group.dir_name())
    }
}

/// Runs every case of the selected group in sequence order.
///
/// Only harness-level problems are errors; failing cases are counted in the
/// returned summary.
pub fn run(options: &RunOptions, reporter: &mut dyn Reporter) -> Result<RunSummary, HarnessError> {
    let backend = Backend::select(options.backend)?;

    let group_dir = options.group_dir();
    if !group_dir.is_dir() {
        return Err(HarnessError::MissingTestDir { path: group_dir });
    }

    let output_dir = &options.pipeline.output_dir;
    fs::create_dir_all(output_dir).map_err(|source| HarnessError::OutputDir {
        path: output_dir.clone(),
        source,
    })?;

    let cases: Vec<TestCase> = CaseDiscoverer::discover(&group_dir)?
        .iter()
        .map(|source| TestCase::new(source, output_dir, backend.artifact_ext(), options.opt_level))
        .collect();
    let names: Vec<String> = cases.iter().map(TestCase::display_name).collect();

    let group = options.group.to_string();
    reporter.report(&Event::BatchStarted {
        group: &group,
        backend: backend.kind(),
        opt_level: options.opt_level,
        cases: &names,
    });

    let pipeline = Pipeline::new(backend, &options.pipeline);
    let mut summary = RunSummary::new(group, backend.kind(), options.opt_level);
    for case in &cases {
        let result = pipeline.run_case(case, reporter);
        summary.record(result.verdict);
    }

    reporter.report(&Event::BatchFinished { summary: &summary });
    Ok(summary)
}
