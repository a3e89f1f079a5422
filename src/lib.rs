//! sytest: a golden-file conformance runner for SysY compilers.
//!
//! Each test case is compiled by the compiler under test, lowered through an
//! external toolchain, executed under a deadline and compared against its
//! expected output.

pub mod backend;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod golden;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod runner;

pub use errors::HarnessError;
pub use pipeline::Verdict;
pub use report::RunSummary;
