//! Abort-to-error bridge.
//!
//! When native code in this object reaches `abort` (a panic under
//! `panic = "abort"`, a panic while panicking, a failed allocation, or an
//! explicit call), the override below runs instead of the C library's. It
//! raises a host error with [`ABORT_MESSAGE`], so the host reports a failed
//! call and keeps running. It never returns.
//!
//! The override exists on every non-Windows build with the `abort-shadow`
//! feature, test binaries of this crate included. A second abort raised while
//! the bridge is still building its error terminates the process.

use churon_core::{ABORT_MESSAGE, NativeFailure};
use churon_core::config::{AbortPolicy, abort_policy};
use churon_core::structured_log::{LogLevel, Outcome, log_event};
use churon_native::guard::take_last_panic;
use churon_native::host;

/// Whether this build defines the `abort` override.
pub const ABORT_SHADOW_INSTALLED: bool = cfg!(all(feature = "abort-shadow", not(windows)));

/// Handle an intercepted abort according to the configured policy. Never returns.
#[cold]
pub fn intercept_abort() -> ! {
    if !host::enter_error_path() {
        host::terminate_process()
    }
    let policy = abort_policy();
    let last_panic = take_last_panic();
    // Built only when a sink is active: the abort may come from a failed allocation.
    let details = move || {
        serde_json::json!({
            "kind": NativeFailure::Abort.kind(),
            "last_panic": last_panic.as_ref().map(|p| p.message.as_str()),
            "location": last_panic.as_ref().and_then(|p| p.location.as_deref()),
        })
    };

    match policy {
        AbortPolicy::Terminate => {
            log_event(LogLevel::Fatal, "abort_terminate", |e| {
                e.with_symbol("abort")
                    .with_policy(policy.as_str())
                    .with_outcome(Outcome::Terminated)
                    .with_details(details())
            });
            host::terminate_process()
        }
        AbortPolicy::RaiseHostError => {
            log_event(LogLevel::Error, "abort_intercepted", |e| {
                e.with_symbol("abort")
                    .with_policy(policy.as_str())
                    .with_message(ABORT_MESSAGE)
                    .with_outcome(Outcome::HostErrorRaised)
                    .with_details(details())
            });
            drop(details);
            host::raise_error(NativeFailure::Abort.host_message())
        }
    }
}

/// Module-local `abort`. Calls from anywhere in this object land here.
#[cfg(all(feature = "abort-shadow", not(windows)))]
#[unsafe(no_mangle)]
pub extern "C" fn abort() -> ! {
    intercept_abort()
}
