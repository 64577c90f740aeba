//! # churon-native
//!
//! The native library behind the churon module. It owns:
//!
//! - the host seam ([`host`]): raising host errors and registering routines,
//! - the scoped panic guard ([`guard`]) every routine body runs under,
//! - the routine table and the registration routine the load hook calls.
//!
//! The load hook itself and the process-abort override live in `churon-abi`,
//! which links this crate into the shared object.

pub mod guard;
pub mod host;
pub mod routines;

use std::ffi::{c_int, c_void};

use churon_core::structured_log::{LogLevel, Outcome, log_event};
use churon_core::{
    ModuleHandle, NativeEntry, NativeFailure, RegistrationError, RoutineTable, RoutineTableBuilder,
};

/// Symbol of the native registration routine.
pub const REGISTRATION_SYMBOL: &str = "R_init_churon_extendr";

/// The routines this library exposes to the host.
///
/// # Errors
///
/// Propagates table validation failures.
pub fn routine_table() -> Result<RoutineTable, RegistrationError> {
    // SAFETY: the host calls `.C` routines with the declared arity, so erasing
    // the signature to `DL_FUNC` is sound.
    let abi_version = unsafe {
        std::mem::transmute::<unsafe extern "C" fn(*mut c_int), NativeEntry>(
            routines::churon_abi_version,
        )
    };
    let selftest_panic: NativeEntry = routines::churon_selftest_panic;
    let selftest_abort: NativeEntry = routines::churon_selftest_abort;

    RoutineTableBuilder::new()
        .routine(c"churon_abi_version", 1, abi_version)
        .routine(c"churon_selftest_panic", 0, selftest_panic)
        .routine(c"churon_selftest_abort", 0, selftest_abort)
        .build()
}

/// Build the routine table and hand it to the host for `handle`.
///
/// Returns the number of routines registered.
///
/// # Errors
///
/// Table validation failures and host registration failures.
pub fn register(handle: ModuleHandle) -> Result<usize, RegistrationError> {
    guard::install_panic_recorder();
    let table = routine_table()?;
    host::register_routines(handle, &table)?;
    log_event(LogLevel::Info, "registration_complete", |e| {
        e.with_symbol(REGISTRATION_SYMBOL)
            .with_handle(handle)
            .with_outcome(Outcome::Completed)
            .with_details(serde_json::json!({ "routines": table.names() }))
    });
    Ok(table.len())
}

/// Native registration routine, called by the load hook with the host's handle.
///
/// Failure is raised as a host error so the load fails loudly.
///
/// # Safety
///
/// `dll` must be the handle the host passed to the load hook.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn R_init_churon_extendr(dll: *mut c_void) {
    let handle = ModuleHandle::from_raw(dll);
    if let Err(err) = guard::guarded(REGISTRATION_SYMBOL, || register(handle)) {
        let failure = NativeFailure::from(err);
        let message = failure.host_message();
        drop(failure);
        log_event(LogLevel::Error, "registration_failed", |e| {
            e.with_symbol(REGISTRATION_SYMBOL)
                .with_handle(handle)
                .with_message(message.as_str())
                .with_outcome(Outcome::HostErrorRaised)
        });
        host::raise_error(message);
    }
}
