//! Handles all user-facing terminal output for the CLI.
//!
//! Each case owns one status line that is rewritten in place as the case
//! moves through its stages, then finalized with a colored verdict. The run
//! ends with a summary block.

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use unicode_width::UnicodeWidthStr;

use crate::golden::Mismatch;
use crate::pipeline::Verdict;
use crate::report::{Event, Reporter, RunSummary};

/// Name column width used when a batch has no cases.
const DEFAULT_NAME_WIDTH: usize = 20;
const RULE_WIDTH: usize = 30;
/// Carriage return followed by "erase to end of line".
const REWIND: &str = "\r\x1b[K";

/// Renders events as in-place status lines.
pub struct TerminalReporter<W: WriteColor> {
    out: W,
    name_width: usize,
    /// Rewrite lines in place; off when stdout is not a terminal.
    interactive: bool,
    show_diff: bool,
}

impl TerminalReporter<StandardStream> {
    /// Reporter on stdout, colored and interactive only on a terminal.
    pub fn stdout(show_diff: bool) -> Self {
        let tty = atty::is(atty::Stream::Stdout);
        let choice = if tty { ColorChoice::Auto } else { ColorChoice::Never };
        Self::new(StandardStream::stdout(choice), tty, show_diff)
    }
}

impl<W: WriteColor> TerminalReporter<W> {
    pub fn new(out: W, interactive: bool, show_diff: bool) -> Self {
        Self {
            out,
            name_width: DEFAULT_NAME_WIDTH,
            interactive,
            show_diff,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    fn status(
        &mut self,
        case: &str,
        text: &str,
        color: Option<Color>,
        last: bool,
    ) -> io::Result<()> {
        if !last && !self.interactive {
            return Ok(());
        }
        if self.interactive {
            write!(self.out, "{REWIND}")?;
        }
        write!(self.out, "{}  ", pad(case, self.name_width))?;
        if let Some(color) = color {
            self.out
                .set_color(ColorSpec::new().set_fg(Some(color)).set_intense(true))?;
        }
        write!(self.out, "{text}")?;
        self.out.reset()?;
        if last {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    fn diff(&mut self, mismatch: &Mismatch) -> io::Result<()> {
        let changeset = Changeset::new(&mismatch.expected, &mismatch.actual, "\n");
        print_diff(&mut self.out, &changeset.diffs)
    }

    fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(self.out)?;
        writeln!(self.out, "{rule}")?;
        writeln!(
            self.out,
            "\tGroup: {}, Stage: {}, Opt Level: {}",
            summary.group, summary.backend, summary.opt_level
        )?;
        writeln!(self.out, "\tPassed: {} / {}", summary.passed, summary.total)?;
        if summary.failed() > 0 {
            writeln!(self.out, "\tFailed: {}", summary.failed())?;
        }
        if let Some(rate) = summary.pass_rate() {
            writeln!(self.out, "\tPass Rate: {rate:.2}%")?;
        }
        writeln!(self.out, "{rule}")?;
        self.out.flush()
    }
}

impl<W: WriteColor> Reporter for TerminalReporter<W> {
    fn report(&mut self, event: &Event<'_>) {
        let _ = match event {
            Event::BatchStarted { cases, .. } => {
                self.name_width = name_width(cases);
                Ok(())
            }
            Event::StageEntered { case, label, .. } => self.status(case, label, None, false),
            Event::CaseFinished {
                case,
                verdict,
                mismatch,
            } => self
                .status(case, verdict.label(), Some(verdict_color(*verdict)), true)
                .and_then(|()| match mismatch {
                    Some(m) if self.show_diff => self.diff(m),
                    _ => Ok(()),
                }),
            Event::BatchFinished { summary } => self.summary(summary),
        };
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::Accepted => Color::Green,
        Verdict::WrongAnswer | Verdict::IoError => Color::Red,
        _ => Color::Yellow,
    }
}

/// Widest case name in display columns.
fn name_width(cases: &[String]) -> usize {
    cases
        .iter()
        .map(|c| UnicodeWidthStr::width(c.as_str()))
        .max()
        .unwrap_or(DEFAULT_NAME_WIDTH)
}

fn pad(name: &str, width: usize) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(name));
    format!("{name}{}", " ".repeat(fill))
}

fn print_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                out.reset()?;
                for line in x.lines() {
                    writeln!(out, "   {line}")?;
                }
            }
            Difference::Rem(ref x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                for line in x.lines() {
                    writeln!(out, " - {line}")?;
                }
            }
            Difference::Add(ref x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                for line in x.lines() {
                    writeln!(out, " + {line}")?;
                }
            }
        }
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, Stage};
    use termcolor::{Ansi, NoColor};

    fn plain(interactive: bool, show_diff: bool) -> TerminalReporter<NoColor<Vec<u8>>> {
        TerminalReporter::new(NoColor::new(Vec::new()), interactive, show_diff)
    }

    fn text(reporter: TerminalReporter<NoColor<Vec<u8>>>) -> String {
        String::from_utf8(reporter.into_inner().into_inner()).unwrap()
    }

    fn start(reporter: &mut impl Reporter, cases: &[String]) {
        reporter.report(&Event::BatchStarted {
            group: "Basic",
            backend: BackendKind::Llvm,
            opt_level: 0,
            cases,
        });
    }

    #[test]
    fn pads_names_to_the_widest_case() {
        let cases = vec!["1_a.sy".to_string(), "100_long.sy".to_string()];
        let mut r = plain(false, false);
        start(&mut r, &cases);
        r.report(&Event::CaseFinished {
            case: "1_a.sy",
            verdict: Verdict::Accepted,
            mismatch: None,
        });
        assert_eq!(text(r), "1_a.sy       Accepted\n");
    }

    #[test]
    fn interactive_lines_are_rewritten_until_the_verdict() {
        let cases = vec!["1_a.sy".to_string()];
        let mut r = plain(true, false);
        start(&mut r, &cases);
        r.report(&Event::StageEntered {
            case: "1_a.sy",
            stage: Stage::Compile,
            label: "Compiling sy to ir",
        });
        r.report(&Event::CaseFinished {
            case: "1_a.sy",
            verdict: Verdict::CompilerError,
            mismatch: None,
        });
        assert_eq!(
            text(r),
            "\r\x1b[K1_a.sy  Compiling sy to ir\r\x1b[K1_a.sy  Compiler Error\n"
        );
    }

    #[test]
    fn non_interactive_output_skips_intermediate_stages() {
        let mut r = plain(false, false);
        r.report(&Event::StageEntered {
            case: "1_a.sy",
            stage: Stage::Execute,
            label: "Executing",
        });
        assert_eq!(text(r), "");
    }

    #[test]
    fn verdicts_are_colored() {
        let mut r = TerminalReporter::new(Ansi::new(Vec::new()), false, false);
        r.report(&Event::CaseFinished {
            case: "1_a.sy",
            verdict: Verdict::WrongAnswer,
            mismatch: None,
        });
        let out = String::from_utf8(r.into_inner().into_inner()).unwrap();
        assert!(out.contains("Wrong Answer"));
        assert!(out.contains("\x1b["));
    }

    #[test]
    fn wrong_answer_diff_is_optional() {
        let mismatch = Mismatch {
            expected: "3\n0".into(),
            actual: "3\n1".into(),
        };
        let event = Event::CaseFinished {
            case: "1_a.sy",
            verdict: Verdict::WrongAnswer,
            mismatch: Some(&mismatch),
        };

        let mut quiet = plain(false, false);
        quiet.report(&event);
        assert!(!text(quiet).contains(" - 0"));

        let mut verbose = plain(false, true);
        verbose.report(&event);
        let out = text(verbose);
        assert!(out.contains("   3\n"));
        assert!(out.contains(" - 0\n"));
        assert!(out.contains(" + 1\n"));
    }

    #[test]
    fn summary_omits_rate_for_empty_batch() {
        let mut r = plain(false, false);
        let summary = RunSummary::new("Basic", BackendKind::Riscv, 1);
        r.report(&Event::BatchFinished { summary: &summary });
        let out = text(r);
        assert!(out.contains("\tGroup: Basic, Stage: riscv, Opt Level: 1\n"));
        assert!(out.contains("\tPassed: 0 / 0\n"));
        assert!(!out.contains("Pass Rate"));
        assert!(!out.contains("Failed"));
    }

    #[test]
    fn summary_rounds_rate_to_two_decimals() {
        let mut r = plain(false, false);
        let mut summary = RunSummary::new("Advanced", BackendKind::Llvm, 2);
        for v in [Verdict::Accepted, Verdict::Accepted, Verdict::LinkError] {
            summary.record(v);
        }
        r.report(&Event::BatchFinished { summary: &summary });
        let out = text(r);
        assert!(out.contains("\tFailed: 1\n"));
        assert!(out.contains("\tPass Rate: 66.67%\n"));
    }
}
