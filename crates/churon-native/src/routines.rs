//! `.C` routines exported through the registration table.
//!
//! These are the diagnostic entry points R code can call to check that the
//! library is loaded and that both interception paths work:
//!
//! ```r
//! .C("churon_abi_version", integer(1))
//! try(.C("churon_selftest_panic"))   # error mentioning "panic"
//! try(.C("churon_selftest_abort"))   # "Rust panic: Aborting churon execution"
//! ```

use std::ffi::c_int;

use crate::guard::guarded;

/// Bumped whenever the routine table changes shape.
pub const ABI_VERSION: c_int = 1;

/// Writes [`ABI_VERSION`] into the first slot of an integer vector.
///
/// # Safety
///
/// `out` must be null or point to at least one writable `c_int`.
pub unsafe extern "C" fn churon_abi_version(out: *mut c_int) {
    guarded("churon_abi_version", || {
        assert!(!out.is_null(), "output vector is NULL");
        // SAFETY: non-null and writable per the caller contract.
        unsafe { out.write(ABI_VERSION) };
    });
}

/// Panics inside the guard.
pub extern "C" fn churon_selftest_panic() {
    guarded::<()>("churon_selftest_panic", || panic!("churon self-test panic"));
}

/// Calls the process abort primitive from native code.
pub extern "C" fn churon_selftest_abort() {
    // SAFETY: abort takes no arguments; inside the shared object it resolves
    // to the bridge.
    unsafe { libc::abort() }
}
