//! Integration test: the `libchuron.so` cargo built for this crate.
//!
//! The module next to this test binary is audited, then loaded the way the
//! host loads it: `dlopen` with `RTLD_NOW | RTLD_LOCAL`, then `R_init_churon`.
//! This executable stands in for the host by exporting `R_registerRoutines`
//! and `Rf_error` (see the `--export-dynamic` link arg in build.rs). Loading
//! and calling routines happens in child processes, since the host stub for
//! `Rf_error` ends the process.
//!
//! Run: cargo test -p churon-abi --test built_artifact_test

#![cfg(target_os = "linux")]

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::{Command, Output};

use churon_core::config::{ABORT_POLICY_ENV, LOG_ENV};
use churon_core::{ABORT_MESSAGE, NativeEntry};
use churon_native::host::CMethodDef;
use churon_native::routines::ABI_VERSION;
use parking_lot::Mutex;

const MODULE_FILE: &str = "libchuron.so";
const MODULE_HANDLE: usize = 0x1;

fn built_module() -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    let deps = exe.parent().expect("test binary directory");
    let mut candidates = vec![deps.join(MODULE_FILE)];
    if let Some(profile_dir) = deps.parent() {
        candidates.push(profile_dir.join(MODULE_FILE));
    }
    candidates
        .into_iter()
        .find(|path| path.exists())
        .unwrap_or_else(|| panic!("{MODULE_FILE} not found next to {}", exe.display()))
}

#[cfg(feature = "abort-shadow")]
#[test]
fn built_module_passes_audit() {
    use churon_harness::{AbortBinding, SymbolPresence, audit_file};

    let audit = audit_file(&built_module(), std::env::consts::OS).expect("module should parse");

    assert!(audit.passed(), "failures: {:?}", audit.failures);
    assert!(audit.shared_object);
    assert!(audit.load_hook_exported);
    assert_eq!(audit.registration_routine, SymbolPresence::Present);
    assert!(matches!(audit.abort_override, AbortBinding::Symbolic | AbortBinding::Local));
}

// ---------------------------------------------------------------------------
// Host stubs, resolved by the loaded module through the global scope
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Routine {
    name: String,
    fun: Option<NativeEntry>,
    num_args: c_int,
}

#[derive(Clone)]
struct Registration {
    handle: usize,
    routines: Vec<Routine>,
}

static REGISTRATION: Mutex<Option<Registration>> = Mutex::new(None);

const RAISED_PREFIX: &str = "CHURON_RAISED:";
const HANDLE_PREFIX: &str = "CHURON_HANDLE:";
const ROUTINE_PREFIX: &str = "CHURON_ROUTINE:";
const VERSION_PREFIX: &str = "CHURON_VERSION:";
const UNREACHABLE_MARKER: &str = "CHURON_UNREACHABLE_MARKER";

/// Records the `.C` table the module publishes.
///
/// # Safety
///
/// `c_methods` must point to a null-terminated method table.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn R_registerRoutines(
    dll: *mut c_void,
    c_methods: *const CMethodDef,
    _call_methods: *const c_void,
    _fortran_methods: *const c_void,
    _external_methods: *const c_void,
) -> c_int {
    let mut routines = Vec::new();
    let mut cursor = c_methods;
    loop {
        // SAFETY: the table ends with an entry whose name is null.
        let def = unsafe { &*cursor };
        let Some(name) = def.name() else { break };
        routines.push(Routine {
            name: name.to_string_lossy().into_owned(),
            fun: def.fun,
            num_args: def.num_args,
        });
        // SAFETY: not past the terminator yet.
        cursor = unsafe { cursor.add(1) };
    }
    *REGISTRATION.lock() = Some(Registration {
        handle: dll.addr(),
        routines,
    });
    1
}

#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "C" fn R_useDynamicSymbols(_dll: *mut c_void, _value: c_int) -> c_int {
    1
}

/// Stand-in for `Rf_error`. The module always calls it as `("%s", message)`,
/// which the Linux calling conventions pass the same way to this
/// non-variadic definition.
///
/// # Safety
///
/// `message` must be a NUL-terminated string.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Rf_error(_fmt: *const c_char, message: *const c_char) {
    // SAFETY: the module passes a NUL-terminated message.
    let message = unsafe { CStr::from_ptr(message) };
    println!("{RAISED_PREFIX}{}", message.to_string_lossy());
    std::process::exit(0);
}

fn dl_error() -> String {
    // SAFETY: dlerror returns null or a NUL-terminated string.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        String::from("unknown dlopen failure")
    } else {
        // SAFETY: non-null result of dlerror.
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

fn load_module() -> *mut c_void {
    let path = CString::new(built_module().as_os_str().as_bytes()).expect("path without NUL");
    // SAFETY: NUL-terminated path.
    let lib = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
    assert!(!lib.is_null(), "dlopen failed: {}", dl_error());
    lib
}

type LoadHook = unsafe extern "C" fn(dll: *mut c_void);

fn initialize(lib: *mut c_void) {
    // SAFETY: live library handle and NUL-terminated name.
    let sym = unsafe { libc::dlsym(lib, c"R_init_churon".as_ptr()) };
    assert!(!sym.is_null(), "R_init_churon is not exported");
    // SAFETY: the load hook has the `void (DllInfo *)` signature.
    let init = unsafe { std::mem::transmute::<*mut c_void, LoadHook>(sym) };
    // SAFETY: the handle is opaque to the module.
    unsafe { init(std::ptr::without_provenance_mut(MODULE_HANDLE)) };
}

// ---------------------------------------------------------------------------
// Child-process scenarios
// ---------------------------------------------------------------------------

const CHILD_ENV: &str = "CHURON_ARTIFACT_TEST_CHILD";

fn run_child(routine: &str) -> Output {
    Command::new(std::env::current_exe().expect("test binary path"))
        .args(["--exact", "child_scenario", "--nocapture", "--test-threads=1", "--quiet"])
        .env(CHILD_ENV, routine)
        .env_remove(ABORT_POLICY_ENV)
        .env_remove(LOG_ENV)
        .output()
        .expect("child test process should spawn")
}

fn prefixed(output: &Output, prefix: &str) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|l| l.strip_prefix(prefix))
        .map(str::to_string)
        .collect()
}

#[test]
fn child_scenario() {
    let Ok(routine) = std::env::var(CHILD_ENV) else {
        return;
    };
    let lib = load_module();
    initialize(lib);

    let registration = REGISTRATION
        .lock()
        .clone()
        .expect("module should register its routines");
    println!("{HANDLE_PREFIX}{:#x}", registration.handle);
    for r in &registration.routines {
        println!("{ROUTINE_PREFIX}{}/{}", r.name, r.num_args);
    }
    let fun = registration
        .routines
        .iter()
        .find(|r| r.name == routine)
        .and_then(|r| r.fun)
        .unwrap_or_else(|| panic!("routine {routine} not registered"));

    if routine == "churon_abi_version" {
        let mut version: c_int = -1;
        // SAFETY: registered with one integer-vector argument.
        let abi_version =
            unsafe { std::mem::transmute::<NativeEntry, unsafe extern "C" fn(*mut c_int)>(fun) };
        // SAFETY: valid pointer to one c_int.
        unsafe { abi_version(&mut version) };
        println!("{VERSION_PREFIX}{version}");
    } else {
        // SAFETY: registered with no arguments.
        unsafe { fun() };
        println!("{UNREACHABLE_MARKER}");
    }
}

#[test]
fn loaded_module_registers_routines_for_host_handle() {
    let output = run_child("churon_abi_version");

    assert!(
        output.status.success(),
        "status: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(prefixed(&output, HANDLE_PREFIX), vec!["0x1"]);
    assert_eq!(
        prefixed(&output, ROUTINE_PREFIX),
        vec![
            "churon_abi_version/1",
            "churon_selftest_panic/0",
            "churon_selftest_abort/0"
        ]
    );
    assert_eq!(prefixed(&output, VERSION_PREFIX), vec![ABI_VERSION.to_string()]);
    assert!(prefixed(&output, RAISED_PREFIX).is_empty());
}

#[test]
fn panic_in_loaded_module_becomes_host_error() {
    let output = run_child("churon_selftest_panic");

    assert!(output.status.success(), "status: {:?}", output.status);
    let raised = prefixed(&output, RAISED_PREFIX);
    assert_eq!(raised.len(), 1);
    assert!(raised[0].contains("panic"));
    assert!(raised[0].contains("churon_selftest_panic"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains(UNREACHABLE_MARKER));
}

#[cfg(feature = "abort-shadow")]
#[test]
fn abort_in_loaded_module_becomes_host_error() {
    let output = run_child("churon_selftest_abort");

    assert!(
        output.status.success(),
        "status: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(prefixed(&output, RAISED_PREFIX), vec![ABORT_MESSAGE.to_string()]);
    assert!(!String::from_utf8_lossy(&output.stdout).contains(UNREACHABLE_MARKER));
}
