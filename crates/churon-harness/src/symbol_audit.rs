//! Symbol audit of the built shared object.
//!
//! Checks what the host and the platform require of the artifact:
//!
//! - the load hook is in the dynamic symbol table,
//! - the native registration routine is still linked in,
//! - the `abort` override exists exactly where the platform strategy wants it,
//!   and references inside the object cannot be redirected to the host's
//!   `abort` at load time.

use std::path::Path;

use churon_core::platform::{InterceptStrategy, strategy_for_target};
use serde::{Deserialize, Serialize};

use crate::elf::{ElfImage, NamedSymbol, SectionType, binds_symbolically};
use crate::error::HarnessError;

pub const LOAD_HOOK_SYMBOL: &str = "R_init_churon";
pub const REGISTRATION_SYMBOL: &str = "R_init_churon_extendr";
pub const ABORT_SYMBOL: &str = "abort";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolPresence {
    Present,
    Absent,
    /// The object is stripped and the symbol is not exported.
    Unknown,
}

/// How the module's `abort` resolves for code inside the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortBinding {
    /// No definition: calls go to the host's `abort`.
    Absent,
    /// Hidden or local definition.
    Local,
    /// Exported definition in an object linked with symbolic binding.
    Symbolic,
    /// Exported definition the dynamic linker may replace with the host's.
    Preemptible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactAudit {
    pub target_os: String,
    pub strategy: InterceptStrategy,
    pub shared_object: bool,
    pub stripped: bool,
    pub symbolic_binding: bool,
    pub load_hook_exported: bool,
    pub registration_routine: SymbolPresence,
    pub abort_override: AbortBinding,
    pub failures: Vec<String>,
}

impl ArtifactAudit {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

fn find_defined<'a>(symbols: &'a [NamedSymbol], name: &str) -> Option<&'a NamedSymbol> {
    symbols
        .iter()
        .find(|s| s.name == name && s.symbol.is_defined())
}

fn classify_abort(
    dynsym: &[NamedSymbol],
    symtab: Option<&[NamedSymbol]>,
    symbolic: bool,
) -> AbortBinding {
    if let Some(sym) = find_defined(dynsym, ABORT_SYMBOL) {
        return if sym.symbol.binds_locally() {
            AbortBinding::Local
        } else if symbolic {
            AbortBinding::Symbolic
        } else {
            AbortBinding::Preemptible
        };
    }
    match symtab.and_then(|t| find_defined(t, ABORT_SYMBOL)) {
        Some(_) => AbortBinding::Local,
        None => AbortBinding::Absent,
    }
}

/// Audit an ELF64 shared object built for `target_os`.
///
/// # Errors
///
/// Malformed or unsupported ELF input.
pub fn audit_artifact(bytes: &[u8], target_os: &str) -> Result<ArtifactAudit, HarnessError> {
    let image = ElfImage::parse(bytes)?;
    let dynsym = image.symbols(SectionType::Dynsym)?.unwrap_or_default();
    let symtab = image.symbols(SectionType::Symtab)?;
    let symbolic_binding = binds_symbolically(&image.dynamic_entries()?);
    let strategy = strategy_for_target(target_os);

    let load_hook_exported = find_defined(&dynsym, LOAD_HOOK_SYMBOL)
        .is_some_and(|s| s.symbol.is_exported());

    let registration_routine = if find_defined(&dynsym, REGISTRATION_SYMBOL).is_some()
        || symtab
            .as_deref()
            .is_some_and(|t| find_defined(t, REGISTRATION_SYMBOL).is_some())
    {
        SymbolPresence::Present
    } else if symtab.is_none() {
        SymbolPresence::Unknown
    } else {
        SymbolPresence::Absent
    };

    let abort_override = classify_abort(&dynsym, symtab.as_deref(), symbolic_binding);

    let mut failures = Vec::new();
    if !image.header.is_shared_object() {
        failures.push("artifact is not a shared object".to_string());
    }
    if !load_hook_exported {
        failures.push(format!("load hook `{LOAD_HOOK_SYMBOL}` is not exported"));
    }
    if registration_routine == SymbolPresence::Absent {
        failures.push(format!(
            "registration routine `{REGISTRATION_SYMBOL}` is not linked in"
        ));
    }
    match (strategy.shadows_abort(), abort_override) {
        (true, AbortBinding::Absent) => failures.push(format!(
            "`{ABORT_SYMBOL}` override missing on {target_os}"
        )),
        (true, AbortBinding::Preemptible) => failures.push(format!(
            "`{ABORT_SYMBOL}` override is exported and preemptible; the host's abort would bypass it"
        )),
        (false, binding) if binding != AbortBinding::Absent => failures.push(format!(
            "`{ABORT_SYMBOL}` override present on {target_os}, which must keep the host's abort"
        )),
        _ => {}
    }

    Ok(ArtifactAudit {
        target_os: target_os.to_string(),
        strategy,
        shared_object: image.header.is_shared_object(),
        stripped: symtab.is_none(),
        symbolic_binding,
        load_hook_exported,
        registration_routine,
        abort_override,
        failures,
    })
}

/// Read and audit the artifact at `path`.
///
/// # Errors
///
/// I/O failures and malformed ELF input.
pub fn audit_file(path: &Path, target_os: &str) -> Result<ArtifactAudit, HarnessError> {
    let bytes = std::fs::read(path).map_err(|e| HarnessError::io(path, e))?;
    audit_artifact(&bytes, target_os)
}
