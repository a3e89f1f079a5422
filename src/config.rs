//! Toolchain configuration.
//!
//! Toolchain paths come from built-in defaults, optionally overridden by a
//! `KEY=VALUE` file (normally `toolchains.conf`). The value is loaded once
//! at start-up and handed to the backend by reference; nothing mutates it
//! afterwards.

use std::fs;
use std::io;
use std::path::Path;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_RISCV_GCC: &str = "riscv64-unknown-elf-gcc";
pub const DEFAULT_RISCV_AR: &str = "riscv64-unknown-elf-ar";
pub const DEFAULT_TEXT_ADDR: &str = "0x90000000";
pub const DEFAULT_CLANG: &str = "clang";
pub const DEFAULT_LLVM_AS: &str = "llvm-as";
pub const DEFAULT_QEMU: &str = "qemu-riscv64";

// ============================================================================
// TOOLCHAINS
// ============================================================================

/// External programs and link parameters used to lower and run artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchains {
    /// Cross compiler driver, used to assemble and link target assembly.
    pub riscv_gcc: String,
    /// Cross archiver.
    pub riscv_ar: String,
    /// Load address of the text segment for cross-linked executables.
    pub text_addr: String,
    /// Host compiler used to lower IR to an object and link it.
    pub clang: String,
    /// IR assembler used only to validate IR syntax.
    pub llvm_as: String,
    /// User-mode emulator for cross-linked executables.
    pub qemu: String,
}

impl Default for Toolchains {
    fn default() -> Self {
        Self {
            riscv_gcc: DEFAULT_RISCV_GCC.to_string(),
            riscv_ar: DEFAULT_RISCV_AR.to_string(),
            text_addr: DEFAULT_TEXT_ADDR.to_string(),
            clang: DEFAULT_CLANG.to_string(),
            llvm_as: DEFAULT_LLVM_AS.to_string(),
            qemu: DEFAULT_QEMU.to_string(),
        }
    }
}

impl Toolchains {
    /// Loads the configuration file at `path` on top of the defaults.
    ///
    /// A missing file is not an error. Any other read failure is returned so
    /// the caller can decide whether to warn; the defaults are still usable.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Applies `KEY=VALUE` lines to the defaults. Unknown keys, comments and
    /// lines without `=` are skipped.
    pub fn parse(content: &str) -> Self {
        let mut toolchains = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            toolchains.set(key.trim(), value.trim());
        }
        toolchains
    }

    fn set(&mut self, key: &str, value: &str) {
        let slot = match key {
            "RISCV_GCC" => &mut self.riscv_gcc,
            "RISCV_AR" => &mut self.riscv_ar,
            "TEXT_ADDR" => &mut self.text_addr,
            "CLANG" => &mut self.clang,
            "LLVM_AS" => &mut self.llvm_as,
            "QEMU" => &mut self.qemu,
            _ => return,
        };
        *slot = value.to_string();
    }

    /// `KEY=VALUE` lines describing the effective configuration.
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("RISCV_GCC={}", self.riscv_gcc),
            format!("RISCV_AR={}", self.riscv_ar),
            format!("TEXT_ADDR={}", self.text_addr),
            format!("CLANG={}", self.clang),
            format!("LLVM_AS={}", self.llvm_as),
            format!("QEMU={}", self.qemu),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_keeps_defaults() {
        assert_eq!(Toolchains::parse(""), Toolchains::default());
    }

    #[test]
    fn overrides_known_keys_and_ignores_the_rest() {
        let conf = "\
# cross toolchain
RISCV_GCC = /opt/riscv/bin/riscv64-unknown-linux-gnu-gcc

TEXT_ADDR=0x80000000
UNKNOWN_KEY=whatever
not a pair
QEMU=/usr/local/bin/qemu-riscv64
";
        let t = Toolchains::parse(conf);
        assert_eq!(t.riscv_gcc, "/opt/riscv/bin/riscv64-unknown-linux-gnu-gcc");
        assert_eq!(t.text_addr, "0x80000000");
        assert_eq!(t.qemu, "/usr/local/bin/qemu-riscv64");
        assert_eq!(t.riscv_ar, DEFAULT_RISCV_AR);
        assert_eq!(t.clang, DEFAULT_CLANG);
    }

    #[test]
    fn value_may_contain_equals() {
        let t = Toolchains::parse("CLANG=env CC=x clang");
        assert_eq!(t.clang, "env CC=x clang");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = Toolchains::load(dir.path().join("toolchains.conf")).unwrap();
        assert_eq!(t, Toolchains::default());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolchains.conf");
        fs::write(&path, "RISCV_AR=/opt/ar\n").unwrap();
        let t = Toolchains::load(&path).unwrap();
        assert_eq!(t.riscv_ar, "/opt/ar");
        assert!(t.describe().contains(&"RISCV_AR=/opt/ar".to_string()));
    }
}
