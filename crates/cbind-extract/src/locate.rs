//! Header location
//!
//! Resolves a requested header identifier to a path usable for parsing.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a header identifier against the search path
///
/// Angle-bracket syntax is stripped; an identifier that is already a
/// valid file path is returned unchanged; otherwise the first existing
/// join against the search directories wins. When nothing matches, the
/// original identifier comes back unchanged and the "not found" failure
/// is deferred to the parser stage.
pub fn locate(header: &str, search: &[PathBuf]) -> PathBuf {
    let name = strip_angles(header);

    let direct = Path::new(name);
    if direct.is_file() {
        return direct.to_path_buf();
    }

    for dir in search {
        let candidate = dir.join(name);
        if candidate.is_file() {
            debug!("located {} in {:?}", name, dir);
            return candidate;
        }
    }

    debug!("header {} not found on search path", name);
    PathBuf::from(name)
}

fn strip_angles(header: &str) -> &str {
    let trimmed = header.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_strip_angles() {
        assert_eq!(strip_angles("<stdio.h>"), "stdio.h");
        assert_eq!(strip_angles("stdio.h"), "stdio.h");
        assert_eq!(strip_angles(" <sys/stat.h> "), "sys/stat.h");
    }

    #[test]
    fn test_locate_existing_path_unchanged() {
        let temp = TempDir::new().unwrap();
        let header = temp.path().join("local.h");
        fs::write(&header, "// local").unwrap();

        let resolved = locate(header.to_str().unwrap(), &[]);
        assert_eq!(resolved, header);
    }

    #[test]
    fn test_locate_searches_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::create_dir_all(second.path().join("sys")).unwrap();
        fs::write(second.path().join("sys/stat.h"), "// stat").unwrap();

        let search = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let resolved = locate("<sys/stat.h>", &search);
        assert_eq!(resolved, second.path().join("sys/stat.h"));
    }

    #[test]
    fn test_locate_miss_returns_identifier() {
        let resolved = locate("<no/such/header.h>", &[]);
        assert_eq!(resolved, PathBuf::from("no/such/header.h"));
    }
}
