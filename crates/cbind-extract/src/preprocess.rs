//! Clang preprocessing
//!
//! Headers are run through the Clang preprocessor before parsing so that
//! includes and conditionals are resolved. `-dD` keeps macro definitions
//! in the output (they parse as `preproc_def` nodes downstream) and `-P`
//! drops line markers the parser has no use for.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during preprocessing
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Clang not found. Please install clang.")]
    ClangNotFound,

    #[error("Preprocessing failed: {0}")]
    PreprocessFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid source file: {0}")]
    InvalidSource(String),
}

/// Result of preprocessing one header
#[derive(Debug)]
pub struct PreprocessedUnit {
    /// Preprocessed source, macro definitions retained
    pub code: String,
    /// Warnings clang printed while preprocessing
    pub warnings: Vec<String>,
}

/// Clang preprocessor wrapper
pub struct Preprocessor {
    clang_path: PathBuf,
}

impl Preprocessor {
    /// Create a new preprocessor, auto-detecting the clang location
    pub fn new() -> Result<Self, PreprocessError> {
        let clang_path = Self::find_clang()?;
        debug!("Found clang at: {:?}", clang_path);
        Ok(Self { clang_path })
    }

    /// Create a preprocessor with a specific clang path
    pub fn with_path(clang_path: PathBuf) -> Self {
        Self { clang_path }
    }

    fn find_clang() -> Result<PathBuf, PreprocessError> {
        let candidates = [
            "clang",
            "/usr/bin/clang",
            "/usr/local/bin/clang",
            "/opt/homebrew/bin/clang",
            "/opt/homebrew/opt/llvm/bin/clang",
        ];

        for candidate in candidates {
            if let Ok(output) = Command::new(candidate).arg("--version").output() {
                if output.status.success() {
                    return Ok(PathBuf::from(candidate));
                }
            }
        }

        Err(PreprocessError::ClangNotFound)
    }

    /// Check if clang is available
    pub fn is_available(&self) -> bool {
        Command::new(&self.clang_path)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Get the clang version line
    pub fn version(&self) -> Option<String> {
        Command::new(&self.clang_path)
            .arg("--version")
            .output()
            .ok()
            .and_then(|o| {
                String::from_utf8(o.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Preprocess one header with the given include search directories
    pub fn preprocess(
        &self,
        header: &Path,
        includes: &[PathBuf],
    ) -> Result<PreprocessedUnit, PreprocessError> {
        if !header.exists() {
            return Err(PreprocessError::InvalidSource(format!(
                "File not found: {:?}",
                header
            )));
        }

        let args = self.build_args(includes);
        debug!("Preprocessing {:?} with args: {:?}", header, args);

        let output = Command::new(&self.clang_path)
            .args(&args)
            .arg(header)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PreprocessError::PreprocessFailed(stderr.to_string()));
        }

        let code = String::from_utf8_lossy(&output.stdout).to_string();
        let warnings = parse_warnings(&output.stderr);

        Ok(PreprocessedUnit { code, warnings })
    }

    fn build_args(&self, includes: &[PathBuf]) -> Vec<String> {
        let mut args = vec![
            "-E".to_string(),
            "-dD".to_string(),
            "-P".to_string(),
            "-x".to_string(),
            "c".to_string(),
        ];

        for include in includes {
            args.push(format!("-I{}", include.display()));
        }

        args
    }
}

fn parse_warnings(stderr: &[u8]) -> Vec<String> {
    let stderr_str = String::from_utf8_lossy(stderr);
    stderr_str
        .lines()
        .filter(|line| line.contains("warning:"))
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let preprocessor = Preprocessor::with_path(PathBuf::from("clang"));
        let includes = vec![PathBuf::from("/usr/include")];

        let args = preprocessor.build_args(&includes);

        assert!(args.contains(&"-E".to_string()));
        assert!(args.contains(&"-dD".to_string()));
        assert!(args.contains(&"-I/usr/include".to_string()));
    }

    #[test]
    fn test_parse_warnings() {
        let stderr = b"foo.h:3:1: warning: something odd\nfoo.h:9:2: error: bad\n";
        let warnings = parse_warnings(stderr);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("something odd"));
    }
}
