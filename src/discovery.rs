use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::HarnessError;

/// Extension of test case sources.
pub const SOURCE_EXT: &str = "sy";
/// Extension of golden output files.
pub const EXPECTED_EXT: &str = "out";
/// Extension of optional stdin files.
pub const INPUT_EXT: &str = "in";
/// Extension of captured output files.
pub const ACTUAL_EXT: &str = "act";

/// A single source file with its golden output and scratch locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// File stem, e.g. `12_while`.
    pub name: String,
    pub source: PathBuf,
    pub expected: PathBuf,
    pub stdin: Option<PathBuf>,
    /// Where captured stdout goes; removed after comparison.
    pub actual: PathBuf,
    /// Where the compiler writes its artifact.
    pub artifact: PathBuf,
    pub opt_level: u8,
}

impl TestCase {
    /// Builds the case for `source`, picking up a sibling `.in` if one exists.
    pub fn new(source: &Path, output_dir: &Path, artifact_ext: &str, opt_level: u8) -> Self {
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let input = source.with_extension(INPUT_EXT);
        Self {
            expected: source.with_extension(EXPECTED_EXT),
            stdin: input.is_file().then_some(input),
            actual: output_dir.join(format!("{name}.{ACTUAL_EXT}")),
            artifact: output_dir.join(format!("{name}-O{opt_level}{artifact_ext}")),
            source: source.to_path_buf(),
            name,
            opt_level,
        }
    }

    /// Source file name as shown in status lines, e.g. `12_while.sy`.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Finds the test case sources directly inside a group directory.
#[derive(Debug)]
pub struct CaseDiscoverer;

impl CaseDiscoverer {
    fn is_source_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == SOURCE_EXT)
    }

    /// Lists `.sy` files in `dir` (not recursive), in execution order.
    /// Symlinked sources count as files.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, HarnessError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !Self::is_source_file(path) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        Self::sort_by_sequence(files)
    }

    /// Orders files by the integer their name starts with, so `10_x` runs
    /// after `2_y`. Equal numbers fall back to the file name.
    pub fn sort_by_sequence(files: Vec<PathBuf>) -> Result<Vec<PathBuf>, HarnessError> {
        let mut keyed = files
            .into_iter()
            .map(|path| {
                let key = Self::sequence_number(&path)
                    .ok_or_else(|| HarnessError::UnorderedCase { path: path.clone() })?;
                Ok((key, path))
            })
            .collect::<Result<Vec<_>, HarnessError>>()?;
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, path)| path).collect())
    }

    /// Leading decimal digits of the file name, if any.
    pub fn sequence_number(path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        let digits = name.find(|c: char| !c.is_ascii_digit()).unwrap_or(name.len());
        name[..digits].parse().ok()
    }
}
