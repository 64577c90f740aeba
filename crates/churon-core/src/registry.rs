//! Registration table: symbolic routine names mapped to native entry points.
//!
//! The native registration routine builds one table at load time and hands it
//! to the host. The table is immutable once built and lives for the rest of
//! the process.

use std::collections::HashSet;
use std::ffi::CStr;

use crate::error::RegistrationError;

/// Type-erased native entry point, the host's `DL_FUNC`.
pub type NativeEntry = unsafe extern "C" fn();

/// Maximum argument count for a `.C` routine.
pub const MAX_ROUTINE_ARITY: u8 = 65;

/// One callable routine.
#[derive(Debug, Clone, Copy)]
pub struct RoutineEntry {
    pub name: &'static CStr,
    pub arity: u8,
    pub entry: NativeEntry,
}

impl RoutineEntry {
    /// Routine name as UTF-8 (validated at build time).
    #[must_use]
    pub fn name_str(&self) -> &'static str {
        self.name.to_str().unwrap_or("<non-utf8>")
    }
}

/// Accumulates routines and validates them into a [`RoutineTable`].
#[derive(Debug, Default)]
pub struct RoutineTableBuilder {
    entries: Vec<RoutineEntry>,
}

impl RoutineTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn routine(mut self, name: &'static CStr, arity: u8, entry: NativeEntry) -> Self {
        self.entries.push(RoutineEntry { name, arity, entry });
        self
    }

    /// Validate every entry and freeze the table.
    ///
    /// # Errors
    ///
    /// Rejects empty or non-symbol names, duplicates, and arities above
    /// [`MAX_ROUTINE_ARITY`]. The first offending entry wins.
    pub fn build(self) -> Result<RoutineTable, RegistrationError> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            let name = validate_name(entry.name)?;
            if entry.arity > MAX_ROUTINE_ARITY {
                return Err(RegistrationError::TooManyArgs {
                    name: name.to_string(),
                    arity: entry.arity,
                    limit: MAX_ROUTINE_ARITY,
                });
            }
            if !seen.insert(name) {
                return Err(RegistrationError::DuplicateRoutine {
                    name: name.to_string(),
                });
            }
        }
        Ok(RoutineTable {
            entries: self.entries,
        })
    }
}

fn validate_name(name: &CStr) -> Result<&str, RegistrationError> {
    let bytes = name.to_bytes();
    if bytes.is_empty() {
        return Err(RegistrationError::EmptyName);
    }
    let invalid = || RegistrationError::InvalidName {
        name: String::from_utf8_lossy(bytes).into_owned(),
    };
    if bytes[0].is_ascii_digit() {
        return Err(invalid());
    }
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
    {
        return Err(invalid());
    }
    // All bytes are ASCII at this point.
    name.to_str().map_err(|_| invalid())
}

/// Validated, immutable set of routines.
#[derive(Debug, Clone)]
pub struct RoutineTable {
    entries: Vec<RoutineEntry>,
}

impl RoutineTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutineEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&RoutineEntry> {
        self.entries.iter().find(|e| e.name.to_bytes() == name.as_bytes())
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(RoutineEntry::name_str).collect()
    }
}
