//! Macro value probe
//!
//! Resolves macros whose value cannot be derived from source tokens by
//! synthesizing, compiling, and running a throwaway native program that
//! prints each value in a self-describing, delimiter-separated format.
//!
//! Every probed entry starts with the delimiter followed by
//! `const <name> = <formatted-value>`. The name travels inside the
//! segment, so results are matched back by name rather than position and
//! a partial failure can never misattribute values.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

use cbind_core::{ConstValue, ConstantDecl};

use crate::classify::parse_int;

/// Segment delimiter in probe program output
const DELIMITER: &str = "<<<cbind>>>";

/// Errors from probe compilation or execution
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("C++ compiler not found")]
    CompilerNotFound,

    #[error("Probe compilation failed: {0}")]
    CompileFailed(String),

    #[error("Probe execution failed: {0}")]
    RunFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Compiles and runs the probe program for one batch of macro names
pub struct MacroProbe {
    compiler: PathBuf,
}

impl MacroProbe {
    /// Create a probe, auto-detecting the C++ compiler
    pub fn new() -> Result<Self, ProbeError> {
        let compiler = Self::find_compiler()?;
        debug!("Found C++ compiler at: {:?}", compiler);
        Ok(Self { compiler })
    }

    /// Create a probe with a specific compiler path
    pub fn with_path(compiler: PathBuf) -> Self {
        Self { compiler }
    }

    fn find_compiler() -> Result<PathBuf, ProbeError> {
        let candidates = [
            "c++",
            "clang++",
            "g++",
            "/usr/bin/c++",
            "/opt/homebrew/bin/clang++",
        ];

        for candidate in candidates {
            if let Ok(output) = Command::new(candidate).arg("--version").output() {
                if output.status.success() {
                    return Ok(PathBuf::from(candidate));
                }
            }
        }

        Err(ProbeError::CompilerNotFound)
    }

    /// Resolve a batch of macro names against the given headers
    ///
    /// Names are deduplicated before probing. The temporary build
    /// directory is removed on every exit path (RAII) whether or not
    /// compilation succeeds.
    pub fn resolve(
        &self,
        names: &[String],
        headers: &[PathBuf],
        includes: &[PathBuf],
    ) -> Result<Vec<ConstantDecl>, ProbeError> {
        let names = dedup(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let source = generate_source(&names, headers);
        debug!("probing {} macros", names.len());

        let dir = tempfile::tempdir()?;
        let source_path = dir.path().join("probe.cc");
        let binary_path = dir.path().join("probe");
        std::fs::write(&source_path, source)?;

        let mut compile = Command::new(&self.compiler);
        compile.arg("-std=c++14");
        for include in includes {
            compile.arg(format!("-I{}", include.display()));
        }
        compile.arg("-o").arg(&binary_path).arg(&source_path);

        let output = compile.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::CompileFailed(stderr.to_string()));
        }

        let run = Command::new(&binary_path).output()?;
        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            return Err(ProbeError::RunFailed(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&run.stdout);
        Ok(parse_output(&stdout, &names))
    }
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

/// Generate the probe program source
///
/// Formatting is overload-driven: strings are quoted, `char` values are
/// wrapped as a `char(<code>)` constructor expression, byte-sized
/// integers are widened before printing so they never come out as raw
/// bytes, and everything else uses default stream formatting.
pub fn generate_source(names: &[String], headers: &[PathBuf]) -> String {
    let mut src = String::new();
    src.push_str("#include <iostream>\n");
    for header in headers {
        src.push_str(&format!("#include \"{}\"\n", header.display()));
    }
    src.push_str(
        r#"
static std::ostream& emit_value(std::ostream& os, const char* v) {
    return os << '"' << v << '"';
}
static std::ostream& emit_value(std::ostream& os, char v) {
    return os << "char(" << int(v) << ")";
}
static std::ostream& emit_value(std::ostream& os, signed char v) {
    return os << int(v);
}
static std::ostream& emit_value(std::ostream& os, unsigned char v) {
    return os << unsigned(v);
}
template <typename T>
static std::ostream& emit_value(std::ostream& os, T v) {
    return os << v;
}

int main() {
"#,
    );
    for name in names {
        src.push_str(&format!(
            "    std::cout << \"\\n{}\\n\" << \"const {} = \";\n    emit_value(std::cout, ({}));\n",
            DELIMITER, name, name
        ));
    }
    src.push_str("    std::cout << std::endl;\n    return 0;\n}\n");
    src
}

/// Parse probe output back into constant declarations
///
/// The output is split on the delimiter, empty segments are dropped, and
/// each remaining segment is matched to a requested name by the name it
/// carries. Unknown names and count mismatches are logged, never fatal.
pub fn parse_output(stdout: &str, names: &[String]) -> Vec<ConstantDecl> {
    let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut constants = Vec::new();

    for segment in stdout.split(DELIMITER) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((name, value)) = parse_segment(segment) else {
            warn!("unparseable probe segment: {:?}", segment);
            continue;
        };
        if !requested.contains(name) {
            warn!("probe returned unrequested name {}", name);
            continue;
        }
        constants.push(ConstantDecl {
            name: name.to_string(),
            value,
        });
    }

    if constants.len() != names.len() {
        warn!(
            "probe returned {} of {} requested values",
            constants.len(),
            names.len()
        );
    }

    constants
}

/// Parse one `const <name> = <value>` segment
fn parse_segment(segment: &str) -> Option<(&str, ConstValue)> {
    let rest = segment.strip_prefix("const ")?;
    let (name, raw) = rest.split_once(" = ")?;
    let raw = raw.trim();

    let value = if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        ConstValue::Str(inner.to_string())
    } else if let Some(code) = raw
        .strip_prefix("char(")
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.trim().parse::<u32>().ok())
        .and_then(char::from_u32)
    {
        ConstValue::Char(code)
    } else if let Some(v) = parse_int(raw) {
        ConstValue::Int(v)
    } else {
        ConstValue::Expr(raw.to_string())
    };

    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generate_source_mentions_each_name() {
        let src = generate_source(
            &names(&["EOF", "BUFSIZ"]),
            &[PathBuf::from("/usr/include/stdio.h")],
        );
        assert!(src.contains("#include \"/usr/include/stdio.h\""));
        assert!(src.contains("const EOF = "));
        assert!(src.contains("emit_value(std::cout, (BUFSIZ))"));
    }

    #[test]
    fn test_parse_output_matches_by_name() {
        let stdout = format!(
            "\n{d}\nconst EOF = -1\n{d}\nconst BAR = \"hi\"\n{d}\nconst C = char(65)\n",
            d = DELIMITER
        );
        let parsed = parse_output(&stdout, &names(&["EOF", "BAR", "C"]));

        assert_eq!(
            parsed,
            vec![
                ConstantDecl {
                    name: "EOF".into(),
                    value: ConstValue::Int(-1),
                },
                ConstantDecl {
                    name: "BAR".into(),
                    value: ConstValue::Str("hi".into()),
                },
                ConstantDecl {
                    name: "C".into(),
                    value: ConstValue::Char('A'),
                },
            ]
        );
    }

    #[test]
    fn test_parse_output_skips_empty_segments() {
        let stdout = format!("{d}{d}\nconst A = 1\n{d}", d = DELIMITER);
        let parsed = parse_output(&stdout, &names(&["A"]));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "A");
    }

    #[test]
    fn test_parse_output_rejects_unrequested_names() {
        let stdout = format!("{d}\nconst ROGUE = 9\n", d = DELIMITER);
        let parsed = parse_output(&stdout, &names(&["WANTED"]));
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_output_partial_results_kept() {
        // A probe aborting mid-stream yields fewer segments; the ones
        // that arrived still attach to the right names.
        let stdout = format!("{d}\nconst A = 1\n", d = DELIMITER);
        let parsed = parse_output(&stdout, &names(&["A", "B"]));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "A");
    }

    #[test]
    fn test_parse_segment_expr_passthrough() {
        let (name, value) = parse_segment("const F = 3.25").unwrap();
        assert_eq!(name, "F");
        assert_eq!(value, ConstValue::Expr("3.25".into()));
    }

    #[test]
    fn test_dedup_preserves_order() {
        let deduped = dedup(&names(&["A", "B", "A", "C", "B"]));
        assert_eq!(deduped, names(&["A", "B", "C"]));
    }

    #[test]
    fn test_resolve_empty_batch_never_compiles() {
        let probe = MacroProbe::with_path(PathBuf::from("/nonexistent/cxx"));
        let resolved = probe.resolve(&[], &[], &[]).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_resolve_with_missing_compiler_fails_batch() {
        let probe = MacroProbe::with_path(PathBuf::from("/nonexistent/cxx"));
        let result = probe.resolve(&names(&["FOO"]), &[], &[]);
        assert!(matches!(result, Err(ProbeError::IoError(_))));
    }
}
