//! System include path discovery
//!
//! Determines the ordered list of directories used both to locate
//! requested headers and as `-I` flags for preprocessing. The list is
//! rediscovered on every invocation so environment changes are picked up.

use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// Sentinel marking the start of the compiler's search list diagnostic
const SEARCH_START: &str = "#include <...> search starts here:";
/// Sentinel marking the end of the search list diagnostic
const SEARCH_END: &str = "End of search list.";

/// Discover the system include search path, earliest entries first
///
/// Any toolchain query failure is non-fatal: the directories already
/// collected are returned as-is.
pub fn discover() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/usr/include")];

    if cfg!(target_os = "macos") {
        match sdk_include_dir() {
            Some(dir) => dirs.push(dir),
            None => warn!("could not query SDK path, using defaults"),
        }
    } else {
        match compiler_search_dirs() {
            Some(found) => {
                for dir in found {
                    if !dirs.contains(&dir) {
                        dirs.push(dir);
                    }
                }
            }
            None => warn!("could not query compiler search list, using defaults"),
        }
    }

    debug!("include search path: {:?}", dirs);
    dirs
}

/// Query the active SDK root and return its header directory
fn sdk_include_dir() -> Option<PathBuf> {
    let output = Command::new("xcrun")
        .arg("--show-sdk-path")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sdk = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sdk.is_empty() {
        return None;
    }
    Some(PathBuf::from(sdk).join("usr/include"))
}

/// Run the C compiler in verbose preprocessing mode against an empty
/// input and scan its diagnostics for the search list
fn compiler_search_dirs() -> Option<Vec<PathBuf>> {
    let cc = find_cc()?;
    let output = Command::new(&cc)
        .args(["-E", "-v", "-x", "c", "/dev/null"])
        .output()
        .ok()?;

    // The search list is printed to stderr regardless of exit status
    let diagnostics = String::from_utf8_lossy(&output.stderr);
    let dirs = parse_search_list(&diagnostics);
    if dirs.is_empty() {
        None
    } else {
        Some(dirs)
    }
}

/// Find a C compiler executable
fn find_cc() -> Option<PathBuf> {
    let candidates = ["cc", "clang", "gcc", "/usr/bin/cc"];

    for candidate in candidates {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            if output.status.success() {
                return Some(PathBuf::from(candidate));
            }
        }
    }

    None
}

/// Extract the directories between the two sentinel lines, trimmed,
/// in the order the compiler printed them
fn parse_search_list(diagnostics: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut in_list = false;

    for line in diagnostics.lines() {
        if line.starts_with(SEARCH_START) {
            in_list = true;
            continue;
        }
        if line.starts_with(SEARCH_END) {
            break;
        }
        if in_list {
            let dir = line.trim();
            if !dir.is_empty() {
                dirs.push(PathBuf::from(dir));
            }
        }
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_list() {
        let diagnostics = r#"clang -cc1 version 15.0.0
ignoring nonexistent directory "/usr/local/missing"
#include "..." search starts here:
#include <...> search starts here:
 /usr/lib/clang/15.0.0/include
 /usr/local/include
 /usr/include
End of search list.
# 1 "/dev/null"
"#;

        let dirs = parse_search_list(diagnostics);
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/usr/lib/clang/15.0.0/include"),
                PathBuf::from("/usr/local/include"),
                PathBuf::from("/usr/include"),
            ]
        );
    }

    #[test]
    fn test_parse_search_list_missing_sentinels() {
        let dirs = parse_search_list("no diagnostics at all\n");
        assert!(dirs.is_empty());
    }

    #[test]
    fn test_parse_search_list_stops_at_end() {
        let diagnostics = "#include <...> search starts here:\n /a\nEnd of search list.\n /not-included\n";
        let dirs = parse_search_list(diagnostics);
        assert_eq!(dirs, vec![PathBuf::from("/a")]);
    }
}
