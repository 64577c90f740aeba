//! Build-time audit for the churon shared object.
//!
//! This crate provides:
//! - ELF64 symbol inspection of the built module (`symbol_audit`)
//! - Validation of the structured logs the module writes (`log_audit`)
//! - The `churon-harness` CLI wrapping both

#![forbid(unsafe_code)]

pub mod elf;
pub mod error;
pub mod log_audit;
pub mod symbol_audit;

pub use error::HarnessError;
pub use log_audit::{LogReport, check_log_file};
pub use symbol_audit::{AbortBinding, ArtifactAudit, SymbolPresence, audit_artifact, audit_file};
