//! cbind Extract
//!
//! The extraction pipeline: locates requested headers on the discovered
//! system search path, preprocesses them with Clang, walks the parsed
//! AST with filtering, resolves opaque macros through a compiled probe
//! program, and synthesizes the final ordered declaration sequence.
//!
//! ## Modules
//!
//! - `search` - system include path discovery
//! - `locate` - header identifier resolution
//! - `preprocess` - Clang preprocessor integration
//! - `walk` - top-level AST walking and filtering
//! - `classify` - macro token classification
//! - `probe` - compiled macro value probe
//! - `synth` - declaration synthesis and zero-constructors

pub mod classify;
pub mod locate;
pub mod preprocess;
pub mod probe;
pub mod search;
pub mod synth;
pub mod walk;

use std::path::PathBuf;
use tracing::{debug, error, warn};

use cbind_core::{Declaration, ExtractRequest, Result};

use preprocess::Preprocessor;
use probe::MacroProbe;
use walk::{WalkState, Walker};

/// One extraction run: a single linear pass over the requested headers
pub struct Pipeline {
    request: ExtractRequest,
}

impl Pipeline {
    pub fn new(request: ExtractRequest) -> Self {
        Self { request }
    }

    /// Run the pipeline and produce the ordered declaration sequence
    ///
    /// Failures are contained at the smallest granularity: a header that
    /// cannot be read is reported and skipped, a failed probe batch
    /// yields no constants, and the rest of the run proceeds.
    pub fn run(&self) -> Result<Vec<Declaration>> {
        let search_path = search::discover();
        let located: Vec<PathBuf> = self
            .request
            .headers
            .iter()
            .map(|h| locate::locate(h, &search_path))
            .collect();

        let preprocessor = match Preprocessor::new() {
            Ok(p) => Some(p),
            Err(err) => {
                warn!("{}, parsing headers without preprocessing", err);
                None
            }
        };

        let mut walker = Walker::new(&self.request);
        let mut state = WalkState::default();
        let mut decls = Vec::new();

        for header in &located {
            let source = match &preprocessor {
                Some(pre) => match pre.preprocess(header, &search_path) {
                    Ok(unit) => {
                        for warning in &unit.warnings {
                            debug!("{}", warning);
                        }
                        unit.code
                    }
                    Err(err) => {
                        error!("preprocessing {:?} failed: {}", header, err);
                        decls.push(Declaration::Info(format!(
                            "could not preprocess {}: {}",
                            header.display(),
                            err
                        )));
                        continue;
                    }
                },
                None => match std::fs::read_to_string(header) {
                    Ok(source) => source,
                    Err(err) => {
                        error!("reading {:?} failed: {}", header, err);
                        decls.push(Declaration::Info(format!(
                            "could not read {}: {}",
                            header.display(),
                            err
                        )));
                        continue;
                    }
                },
            };

            if let Err(err) = walker.walk_unit(&source, &mut state, &mut decls) {
                error!("walking {:?} failed: {}", header, err);
                decls.push(Declaration::Info(format!(
                    "could not parse {}: {}",
                    header.display(),
                    err
                )));
            }
        }

        // Resolve the opaque-macro set collected across all headers in
        // one batch; a failed probe loses only these constants
        if !state.opaque_macros.is_empty() {
            let probed = MacroProbe::new().and_then(|probe| {
                probe.resolve(&state.opaque_macros, &located, &search_path)
            });
            match probed {
                Ok(constants) => {
                    for constant in constants {
                        if state.seen.insert(constant.name.clone()) {
                            decls.push(Declaration::Constant(constant));
                        } else {
                            debug!("{} already emitted, skipping probe result", constant.name);
                        }
                    }
                }
                Err(err) => {
                    error!("macro probe failed: {}", err);
                    decls.push(Declaration::Info(format!("macro probe failed: {}", err)));
                }
            }
        }

        Ok(synth::finalize(decls))
    }
}

/// Convenience wrapper: run one extraction request
pub fn extract(request: ExtractRequest) -> Result<Vec<Declaration>> {
    Pipeline::new(request).run()
}
