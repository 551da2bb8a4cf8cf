//! cbind Core
//!
//! Core types and interfaces for the cbind header binding generator:
//! the declaration model produced by extraction, the extraction request,
//! and the registrar contract (duplicate guard + constant index).

pub mod decl;
pub mod error;
pub mod registry;
pub mod request;

pub use decl::*;
pub use error::{Error, Result};
pub use registry::{Registrar, ScopeRegistry};
pub use request::{ExtractRequest, DEFAULT_LIBRARY};
