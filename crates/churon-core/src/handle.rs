//! Opaque module handle supplied by the host at load time.
//!
//! The layout behind the pointer belongs to the host runtime (`DllInfo*` for
//! R). The bridge never reads through it and never checks it; it only carries
//! the value from the load hook to the registration routine unchanged.

use std::ffi::c_void;
use std::fmt;

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(*mut c_void);

impl ModuleHandle {
    #[must_use]
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    #[must_use]
    pub const fn as_raw(self) -> *mut c_void {
        self.0
    }

    /// Address of the handle, for logging and test doubles.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.addr()
    }

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleHandle({:#x})", self.addr())
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}
