//! Progress events and run aggregation.
//!
//! The pipeline and the orchestrator never print. They emit [`Event`]s to a
//! [`Reporter`], which decides what to show. The terminal renderer lives in
//! [`crate::cli::output`]; this module provides the JSON-lines renderer for
//! machine consumers and an in-memory [`Recorder`].

use std::io::Write;

use serde::Serialize;

use crate::backend::{BackendKind, Stage};
use crate::golden::Mismatch;
use crate::pipeline::Verdict;

// ============================================================================
// EVENTS
// ============================================================================

/// Something that happened during a run. Case names are source file names.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    BatchStarted {
        group: &'a str,
        backend: BackendKind,
        opt_level: u8,
        cases: &'a [String],
    },
    StageEntered {
        case: &'a str,
        stage: Stage,
        label: &'a str,
    },
    CaseFinished {
        case: &'a str,
        verdict: Verdict,
        #[serde(skip_serializing_if = "Option::is_none")]
        mismatch: Option<&'a Mismatch>,
    },
    BatchFinished {
        summary: &'a RunSummary,
    },
}

/// Consumer of progress events. Reporting never influences verdicts, so
/// implementations swallow their own I/O errors.
pub trait Reporter {
    fn report(&mut self, event: &Event<'_>);
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Pass/fail counts for one (group, backend, opt level) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub group: String,
    pub backend: BackendKind,
    pub opt_level: u8,
    pub total: usize,
    pub passed: usize,
}

impl RunSummary {
    pub fn new(group: impl Into<String>, backend: BackendKind, opt_level: u8) -> Self {
        Self {
            group: group.into(),
            backend,
            opt_level,
            total: 0,
            passed: 0,
        }
    }

    pub fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        if verdict.is_accepted() {
            self.passed += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    /// Percentage of accepted cases, or `None` for an empty batch.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.passed as f64 / self.total as f64 * 100.0)
    }
}

// ============================================================================
// REPORTERS
// ============================================================================

/// Writes each event as one JSON object per line.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, event: &Event<'_>) {
        if serde_json::to_writer(&mut self.out, event).is_ok() {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
    }
}

/// Owned copy of the events that matter for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Started { cases: Vec<String> },
    Stage { case: String, stage: Stage },
    Finished { case: String, verdict: Verdict },
    Summary(RunSummary),
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    pub records: Vec<Record>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal verdicts in the order cases finished.
    pub fn verdicts(&self) -> Vec<(String, Verdict)> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Finished { case, verdict } => Some((case.clone(), *verdict)),
                _ => None,
            })
            .collect()
    }

    /// Stages entered by `case`, in order.
    pub fn stages_of(&self, case: &str) -> Vec<Stage> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Stage { case: c, stage } if c == case => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for Recorder {
    fn report(&mut self, event: &Event<'_>) {
        let record = match event {
            Event::BatchStarted { cases, .. } => Record::Started {
                cases: cases.to_vec(),
            },
            Event::StageEntered { case, stage, .. } => Record::Stage {
                case: case.to_string(),
                stage: *stage,
            },
            Event::CaseFinished { case, verdict, .. } => Record::Finished {
                case: case.to_string(),
                verdict: *verdict,
            },
            Event::BatchFinished { summary } => Record::Summary((*summary).clone()),
        };
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_only_accepted_as_passed() {
        let mut summary = RunSummary::new("Basic", BackendKind::Llvm, 0);
        assert_eq!(summary.pass_rate(), None);

        summary.record(Verdict::Accepted);
        summary.record(Verdict::WrongAnswer);
        summary.record(Verdict::CompileTimeExceeded);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed(), 2);
        let rate = summary.pass_rate().unwrap();
        assert_eq!(format!("{rate:.2}"), "33.33");
    }

    #[test]
    fn json_reporter_writes_one_object_per_line() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.report(&Event::StageEntered {
            case: "1_add.sy",
            stage: Stage::CheckSyntax,
            label: "Checking IR syntax",
        });
        let mismatch = Mismatch {
            expected: "3\n0".into(),
            actual: "3\n1".into(),
        };
        reporter.report(&Event::CaseFinished {
            case: "1_add.sy",
            verdict: Verdict::WrongAnswer,
            mismatch: Some(&mismatch),
        });
        reporter.report(&Event::CaseFinished {
            case: "2_sub.sy",
            verdict: Verdict::Accepted,
            mismatch: None,
        });

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "stage_entered");
        assert_eq!(lines[0]["stage"], "check_syntax");
        assert_eq!(lines[1]["verdict"], "wrong_answer");
        assert_eq!(lines[1]["mismatch"]["actual"], "3\n1");
        assert!(lines[2].get("mismatch").is_none());
    }

    #[test]
    fn batch_summary_serializes_backend_name() {
        let summary = RunSummary::new("Advanced", BackendKind::Riscv, 2);
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.report(&Event::BatchFinished { summary: &summary });
        let value: serde_json::Value =
            serde_json::from_slice(&reporter.into_inner()).unwrap();
        assert_eq!(value["summary"]["backend"], "riscv");
        assert_eq!(value["summary"]["group"], "Advanced");
        assert_eq!(value["summary"]["opt_level"], 2);
    }

    #[test]
    fn recorder_keeps_stage_order() {
        let mut rec = Recorder::new();
        for stage in [Stage::Compile, Stage::Link] {
            rec.report(&Event::StageEntered {
                case: "a.sy",
                stage,
                label: "",
            });
        }
        rec.report(&Event::CaseFinished {
            case: "a.sy",
            verdict: Verdict::LinkError,
            mismatch: None,
        });
        assert_eq!(rec.stages_of("a.sy"), [Stage::Compile, Stage::Link]);
        assert_eq!(rec.verdicts(), [("a.sy".to_string(), Verdict::LinkError)]);
    }
}
