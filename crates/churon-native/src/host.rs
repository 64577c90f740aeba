//! Host runtime seam.
//!
//! The native library needs exactly two things from the host: a way to raise
//! an error that unwinds out of the current native call (`Rf_error`), and a
//! way to publish the routine table (`R_registerRoutines`). Both are looked up
//! by name in the running process instead of being link-time imports, so the
//! library builds and tests without the host present.
//!
//! [`install_hooks`] replaces the resolved host with Rust callbacks. Test
//! doubles and embedders that are not R use it.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::io::Write;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use churon_core::failure::{HOST_RETURNED_MESSAGE, sanitize_for_host};
use churon_core::structured_log::{LogLevel, Outcome, log_event};
use churon_core::{ModuleHandle, NativeEntry, RegistrationError, RoutineTable};
use parking_lot::RwLock;

/// Host `R_CMethodDef`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CMethodDef {
    pub name: *const c_char,
    pub fun: Option<NativeEntry>,
    pub num_args: c_int,
    /// `R_NativePrimitiveArgType*`; always null (no type checking).
    pub types: *const c_void,
}

impl CMethodDef {
    const TERMINATOR: Self = Self {
        name: ptr::null(),
        fun: None,
        num_args: 0,
        types: ptr::null(),
    };

    /// Routine name, if the entry is not the terminator.
    #[must_use]
    pub fn name(&self) -> Option<&CStr> {
        if self.name.is_null() {
            None
        } else {
            // SAFETY: non-null names always come from a `&'static CStr` in the routine table.
            Some(unsafe { CStr::from_ptr(self.name) })
        }
    }
}

type RfErrorFn = unsafe extern "C" fn(fmt: *const c_char, ...);
type RegisterRoutinesFn = unsafe extern "C" fn(
    dll: *mut c_void,
    c_methods: *const CMethodDef,
    call_methods: *const c_void,
    fortran_methods: *const c_void,
    external_methods: *const c_void,
) -> c_int;
type UseDynamicSymbolsFn = unsafe extern "C" fn(dll: *mut c_void, value: c_int) -> c_int;

/// Rust stand-ins for the host primitives.
#[derive(Debug, Clone, Copy)]
pub struct HostHooks {
    /// Must not return: unwind or jump back into the caller's host frame.
    pub raise_error: fn(&CStr),
    /// Receives the routine table without its terminator; returns the host status.
    pub register_routines: fn(ModuleHandle, &[CMethodDef]) -> c_int,
}

static HOOKS: RwLock<Option<HostHooks>> = RwLock::new(None);

/// Route host calls to `hooks`, or back to the resolved host with `None`.
pub fn install_hooks(hooks: Option<HostHooks>) {
    *HOOKS.write() = hooks;
}

fn current_hooks() -> Option<HostHooks> {
    // The abort path must not wait on a writer.
    HOOKS.try_read().and_then(|guard| *guard)
}

/// A host primitive resolved by name, cached once found.
struct HostSymbol {
    name: &'static CStr,
    slot: AtomicPtr<c_void>,
}

impl HostSymbol {
    const fn new(name: &'static CStr) -> Self {
        Self {
            name,
            slot: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn symbol_name(&self) -> &'static str {
        self.name.to_str().unwrap_or("<host symbol>")
    }

    fn resolve(&self) -> Option<*mut c_void> {
        let cached = self.slot.load(Ordering::Acquire);
        if !cached.is_null() {
            return Some(cached);
        }
        let found = lookup_process_symbol(self.name);
        if found.is_null() {
            // Not cached: the host may still be mid-load.
            return None;
        }
        self.slot.store(found, Ordering::Release);
        Some(found)
    }
}

#[cfg(unix)]
fn lookup_process_symbol(name: &CStr) -> *mut c_void {
    // SAFETY: `name` is NUL-terminated; RTLD_DEFAULT searches the global scope.
    unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) }
}

#[cfg(not(unix))]
fn lookup_process_symbol(_name: &CStr) -> *mut c_void {
    ptr::null_mut()
}

static RF_ERROR: HostSymbol = HostSymbol::new(c"Rf_error");
static R_REGISTER_ROUTINES: HostSymbol = HostSymbol::new(c"R_registerRoutines");
static R_USE_DYNAMIC_SYMBOLS: HostSymbol = HostSymbol::new(c"R_useDynamicSymbols");

thread_local! {
    // Holds the message for the duration of the host call. The host copies it
    // before jumping, and keeping it here means nothing leaks when it does.
    static HOST_MESSAGE: RefCell<CString> = RefCell::new(CString::default());
    // Set while this thread builds a host error; cleared before the host runs.
    static ERROR_PATH: Cell<bool> = const { Cell::new(false) };
}

/// Mark this thread as building a host error.
///
/// Returns `false` when it already was: something failed inside the error
/// path itself, and the caller must terminate instead of raising again.
#[must_use]
pub fn enter_error_path() -> bool {
    ERROR_PATH
        .try_with(|active| !active.replace(true))
        .unwrap_or(false)
}

fn leave_error_path() {
    let _ = ERROR_PATH.try_with(|active| active.set(false));
}

fn stash_message(message: String) -> *const c_char {
    let c_message = CString::new(sanitize_for_host(&message)).unwrap_or_default();
    drop(message);
    let mut pending = Some(c_message);
    let stashed = HOST_MESSAGE.try_with(|slot| {
        let mut slot = slot.try_borrow_mut().ok()?;
        *slot = pending.take()?;
        Some(slot.as_ptr())
    });
    match stashed {
        Ok(Some(ptr)) => ptr,
        // Thread is tearing down its locals; fall back to a leaked copy.
        _ => pending.take().unwrap_or_default().into_raw(),
    }
}

/// Raise a host error carrying `message`. Never returns.
///
/// All Rust-owned state is released before control passes to the host, since
/// the host may jump over this frame without running destructors. If the host
/// primitive returns anyway, the process is terminated.
#[cold]
pub fn raise_error(message: impl Into<String>) -> ! {
    let _ = enter_error_path();
    let message_ptr = stash_message(message.into());
    // The host may jump over this frame; the flag must not outlive it.
    leave_error_path();

    if let Some(hooks) = current_hooks() {
        // SAFETY: `message_ptr` points into the thread-local slot filled above.
        let message = unsafe { CStr::from_ptr(message_ptr) };
        (hooks.raise_error)(message);
    } else if let Some(sym) = RF_ERROR.resolve() {
        // SAFETY: `Rf_error` has the `void (const char *, ...)` signature.
        let rf_error: RfErrorFn = unsafe { std::mem::transmute::<*mut c_void, RfErrorFn>(sym) };
        // SAFETY: a literal "%s" format with one NUL-terminated string argument.
        unsafe { rf_error(c"%s".as_ptr(), message_ptr) };
    } else {
        no_host_available()
    }

    host_returned()
}

#[cold]
fn no_host_available() -> ! {
    const MESSAGE: &str = "churon: no host error primitive in this process";
    log_event(LogLevel::Fatal, "host_contract_violation", |e| {
        e.with_symbol(RF_ERROR.symbol_name())
            .with_message(MESSAGE)
            .with_outcome(Outcome::Terminated)
    });
    write_stderr_line(MESSAGE);
    terminate_process()
}

#[cold]
fn host_returned() -> ! {
    log_event(LogLevel::Fatal, "host_contract_violation", |e| {
        e.with_symbol(RF_ERROR.symbol_name())
            .with_message(HOST_RETURNED_MESSAGE)
            .with_outcome(Outcome::Terminated)
    });
    write_stderr_line(HOST_RETURNED_MESSAGE);
    terminate_process()
}

fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(message.as_bytes());
    let _ = stderr.write_all(b"\n");
}

/// Terminate with the default abort disposition.
///
/// Does not call `abort`: inside the shared object that symbol is the bridge.
#[cfg(unix)]
pub fn terminate_process() -> ! {
    // SAFETY: signal/raise/_exit are async-signal-safe and take no pointers.
    unsafe {
        libc::signal(libc::SIGABRT, libc::SIG_DFL);
        libc::raise(libc::SIGABRT);
        libc::_exit(128 + libc::SIGABRT)
    }
}

/// Terminate with the default abort disposition.
#[cfg(not(unix))]
pub fn terminate_process() -> ! {
    std::process::abort()
}

/// Build the host's null-terminated method table. Lives for the process.
fn host_method_table(table: &RoutineTable) -> &'static [CMethodDef] {
    let mut defs: Vec<CMethodDef> = table
        .iter()
        .map(|entry| CMethodDef {
            name: entry.name.as_ptr(),
            fun: Some(entry.entry),
            num_args: c_int::from(entry.arity),
            types: ptr::null(),
        })
        .collect();
    defs.push(CMethodDef::TERMINATOR);
    Box::leak(defs.into_boxed_slice())
}

/// Publish `table` to the host for `handle` and disable dynamic symbol lookup.
///
/// # Errors
///
/// `HostUnavailable` when no registration primitive can be found,
/// `HostRejected` when the host reports failure.
pub fn register_routines(
    handle: ModuleHandle,
    table: &RoutineTable,
) -> Result<(), RegistrationError> {
    let defs = host_method_table(table);
    let (without_terminator, _) = defs.split_at(defs.len() - 1);

    let status = if let Some(hooks) = current_hooks() {
        (hooks.register_routines)(handle, without_terminator)
    } else {
        let sym = R_REGISTER_ROUTINES
            .resolve()
            .ok_or(RegistrationError::HostUnavailable {
                symbol: R_REGISTER_ROUTINES.symbol_name(),
            })?;
        // SAFETY: `R_registerRoutines` has the declared signature.
        let register: RegisterRoutinesFn =
            unsafe { std::mem::transmute::<*mut c_void, RegisterRoutinesFn>(sym) };
        // SAFETY: `defs` is null-terminated and 'static; the handle is the host's own.
        let status = unsafe {
            register(
                handle.as_raw(),
                defs.as_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        };
        if let Some(sym) = R_USE_DYNAMIC_SYMBOLS.resolve() {
            // SAFETY: `R_useDynamicSymbols` has the declared signature.
            let use_dynamic: UseDynamicSymbolsFn =
                unsafe { std::mem::transmute::<*mut c_void, UseDynamicSymbolsFn>(sym) };
            // SAFETY: same handle the host passed to the load hook.
            unsafe { use_dynamic(handle.as_raw(), 0) };
        }
        status
    };

    if status == 0 {
        return Err(RegistrationError::HostRejected { status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use churon_core::RoutineTableBuilder;

    unsafe extern "C" fn noop() {}

    #[test]
    fn method_table_is_null_terminated() {
        let table = RoutineTableBuilder::new()
            .routine(c"first", 1, noop)
            .routine(c"second", 3, noop)
            .build()
            .unwrap();
        let defs = host_method_table(&table);
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].name(), Some(c"first"));
        assert_eq!(defs[1].num_args, 3);
        assert!(defs[2].name.is_null());
        assert!(defs[2].fun.is_none());
        assert!(defs[2].name().is_none());
    }

    #[test]
    fn stash_message_sanitizes_and_keeps_pointer_valid() {
        let ptr = stash_message("bad\0message".to_string());
        // SAFETY: pointer into this thread's slot, not replaced yet.
        let stored = unsafe { CStr::from_ptr(ptr) };
        assert_eq!(stored, c"badmessage");
    }

    #[test]
    fn stash_message_replaces_previous_message() {
        let _ = stash_message("first".to_string());
        let ptr = stash_message("second".to_string());
        // SAFETY: pointer into this thread's slot, not replaced yet.
        assert_eq!(unsafe { CStr::from_ptr(ptr) }, c"second");
    }

    #[test]
    fn error_path_admits_one_entry_per_thread() {
        assert!(enter_error_path());
        assert!(!enter_error_path());
        std::thread::spawn(|| assert!(enter_error_path()))
            .join()
            .unwrap();
        leave_error_path();
        assert!(enter_error_path());
        leave_error_path();
    }

    #[test]
    fn process_without_host_has_no_rf_error() {
        // Test binaries do not link R.
        assert!(RF_ERROR.resolve().is_none());
        assert!(R_REGISTER_ROUTINES.resolve().is_none());
    }
}
