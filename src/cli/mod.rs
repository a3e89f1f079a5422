//! The sytest command-line interface.
//!
//! Parses arguments, loads the toolchain configuration, picks a reporter and
//! hands off to the batch runner. Harness-fatal errors are rendered with
//! `miette` and turn into exit status 1; failing cases do not.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::cli::args::{Format, SytestArgs};
use crate::cli::output::TerminalReporter;
use crate::config::Toolchains;
use crate::report::{JsonReporter, Reporter};
use crate::runner;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = SytestArgs::parse();
    let toolchains = load_toolchains(&args);

    if args.show_config {
        for line in toolchains.describe() {
            println!("{line}");
        }
        return ExitCode::SUCCESS;
    }

    let options = args.run_options(toolchains);
    let mut reporter: Box<dyn Reporter> = match args.format {
        Format::Human => Box::new(TerminalReporter::stdout(args.show_diff)),
        Format::Json => Box::new(JsonReporter::new(io::stdout())),
    };

    match runner::run(&options, reporter.as_mut()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

/// Reads the toolchain file, falling back to defaults with a warning when it
/// exists but cannot be read.
fn load_toolchains(args: &SytestArgs) -> Toolchains {
    match Toolchains::load(&args.toolchains) {
        Ok(toolchains) => toolchains,
        Err(e) => {
            let message = format!(
                "cannot read {}: {e}; using default toolchains",
                args.toolchains.display()
            );
            let _ = warn(&message);
            Toolchains::default()
        }
    }
}

fn warn(message: &str) -> io::Result<()> {
    let choice = if atty::is(atty::Stream::Stderr) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(choice);
    stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(stderr, "warning")?;
    stderr.reset()?;
    writeln!(stderr, ": {message}")
}
