//! Module load hook.
//!
//! The host calls `R_init_<module>` once, right after loading the shared
//! object, with its opaque description of the module. The hook forwards that
//! handle unchanged to the native registration routine and does nothing else.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use churon_core::ModuleHandle;
use churon_core::platform::current_strategy;
use churon_core::structured_log::{LogLevel, log_event};

/// Symbol the host looks up after loading the module.
pub const LOAD_HOOK_SYMBOL: &str = "R_init_churon";

/// Signature shared by the load hook and the registration routine.
pub type RegistrarFn = unsafe extern "C" fn(*mut c_void);

static REGISTRAR_OVERRIDE: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Redirect the load hook to `registrar`, or back to the native registration
/// routine with `None`.
pub fn set_registrar_for_tests(registrar: Option<RegistrarFn>) {
    let raw = registrar.map_or(ptr::null_mut(), |f| f as *mut ());
    REGISTRAR_OVERRIDE.store(raw, Ordering::Release);
}

fn registrar() -> RegistrarFn {
    let raw = REGISTRAR_OVERRIDE.load(Ordering::Acquire);
    if raw.is_null() {
        churon_native::R_init_churon_extendr
    } else {
        // SAFETY: only `set_registrar_for_tests` stores here, always from a `RegistrarFn`.
        unsafe { std::mem::transmute::<*mut (), RegistrarFn>(raw) }
    }
}

/// Load hook. Forwards `dll` to the registration routine.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn R_init_churon(dll: *mut c_void) {
    let handle = ModuleHandle::from_raw(dll);
    log_event(LogLevel::Info, "module_load", |e| {
        e.with_symbol(LOAD_HOOK_SYMBOL)
            .with_handle(handle)
            .with_details(serde_json::json!({ "strategy": current_strategy() }))
    });
    // SAFETY: the handle is passed through exactly as the host supplied it.
    unsafe { registrar()(handle.as_raw()) }
}
