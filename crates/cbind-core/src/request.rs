//! Extraction request
//!
//! The immutable per-invocation input to the pipeline: which headers to
//! extract, how to filter names, and which library function symbols
//! resolve from.

use regex::Regex;

/// Library name that resolves symbols without qualification
pub const DEFAULT_LIBRARY: &str = "libc";

/// One extraction request, immutable for the duration of a pipeline run
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Header identifiers: bare names (`stdio.h`, `<stdio.h>`) or paths
    pub headers: Vec<String>,
    /// Names matching this pattern are kept even when excluded
    pub include: Option<Regex>,
    /// Names matching this pattern are skipped (enums are never filtered)
    pub exclude: Option<Regex>,
    /// Library name function declarations are bound to
    pub library: String,
    /// Macros starting with this prefix are implementation-reserved and
    /// skipped; failure logs for such names are suppressed
    pub reserved_prefix: String,
    /// Suppress informational logs
    pub quiet: bool,
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            include: None,
            exclude: None,
            library: DEFAULT_LIBRARY.to_string(),
            reserved_prefix: "_".to_string(),
            quiet: false,
        }
    }
}

impl ExtractRequest {
    /// Request for the given headers with default policy
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the include pattern
    pub fn with_include(mut self, pattern: Regex) -> Self {
        self.include = Some(pattern);
        self
    }

    /// Set the exclude pattern
    pub fn with_exclude(mut self, pattern: Regex) -> Self {
        self.exclude = Some(pattern);
        self
    }

    /// Bind function declarations to a specific library
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// Whether filtering policy rejects this name: the exclude pattern
    /// matches and the include pattern does not rescue it
    pub fn is_excluded(&self, name: &str) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        if !exclude.is_match(name) {
            return false;
        }
        match &self.include {
            Some(include) => !include.is_match(name),
            None => true,
        }
    }

    /// Whether this name is implementation-reserved
    pub fn is_reserved(&self, name: &str) -> bool {
        !self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_nothing() {
        let req = ExtractRequest::new(["stdio.h"]);
        assert!(!req.is_excluded("printf"));
        assert!(!req.is_excluded("anything"));
    }

    #[test]
    fn test_exclude_pattern() {
        let req = ExtractRequest::new(["stdio.h"])
            .with_exclude(Regex::new("^pthread_").unwrap());
        assert!(req.is_excluded("pthread_create"));
        assert!(!req.is_excluded("printf"));
    }

    #[test]
    fn test_include_rescues_excluded() {
        let req = ExtractRequest::new(["stdio.h"])
            .with_exclude(Regex::new("^pthread_").unwrap())
            .with_include(Regex::new("^pthread_create$").unwrap());
        assert!(!req.is_excluded("pthread_create"));
        assert!(req.is_excluded("pthread_join"));
    }

    #[test]
    fn test_reserved_prefix() {
        let req = ExtractRequest::default();
        assert!(req.is_reserved("__GNUC__"));
        assert!(req.is_reserved("_IO_FILE"));
        assert!(!req.is_reserved("FILE"));
    }
}
