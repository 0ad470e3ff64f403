//! Shared primitives for the biocatalyzer workspace.
//!
//! `biocat-core` is the foundation the other crates build on:
//!
//! - **Error types**: [`BiocatError`] and [`Result`] for structured error handling
//! - **Traits**: the [`MolecularOps`] capability interface that every chemistry
//!   backend implements, plus small shared contracts like [`ContentAddressable`]
//! - **Hashing**: SHA-256 content addressing used for deterministic identifiers

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{BiocatError, Result};
pub use traits::*;
