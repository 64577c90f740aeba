//! Scoped panic interception at routine boundaries.
//!
//! Every routine the host can call runs its body under [`guarded`]. A panic
//! that would otherwise unwind into C frames is caught here and converted into
//! exactly one host error whose message names the routine and says "panic".
//!
//! [`install_panic_recorder`] keeps the most recent panic per thread so the
//! abort bridge can report it when unwinding was not available.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use churon_core::NativeFailure;
use churon_core::failure::payload_message;
use churon_core::structured_log::{LogLevel, Outcome, log_event};

use crate::host;

/// Run `body`, converting a panic into a host error raised for `routine`.
pub fn guarded<R>(routine: &'static str, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let detail = payload_message(&*payload);
            // The payload must be gone before the host jumps over this frame.
            drop(payload);
            let _ = take_last_panic();
            let message = NativeFailure::panic(routine, detail).host_message();
            log_event(LogLevel::Error, "native_panic_intercepted", |e| {
                e.with_routine(routine)
                    .with_message(message.as_str())
                    .with_outcome(Outcome::HostErrorRaised)
            });
            host::raise_error(message)
        }
    }
}

/// A panic observed by the recorder hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicRecord {
    pub message: String,
    pub location: Option<String>,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

static RECORDER: Once = Once::new();

/// Chain a panic hook that records the last panic on each thread. Idempotent.
pub fn install_panic_recorder() {
    RECORDER.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let record = PanicRecord {
                message: payload_message(info.payload()),
                location: info
                    .location()
                    .map(|loc| format!("{}:{}", loc.file(), loc.line())),
            };
            let _ = LAST_PANIC.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(record);
                }
            });
            previous(info);
        }));
    });
}

/// Take the panic recorded on this thread, if any.
#[must_use]
pub fn take_last_panic() -> Option<PanicRecord> {
    LAST_PANIC
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_passes_through_values() {
        assert_eq!(guarded("add", || 2 + 2), 4);
        assert_eq!(guarded("concat", || format!("{}-{}", "a", "b")), "a-b");
    }

    #[test]
    fn recorder_captures_message_and_location() {
        install_panic_recorder();
        install_panic_recorder();
        let _ = take_last_panic();

        let result = panic::catch_unwind(|| panic!("recorded boom"));
        assert!(result.is_err());

        let record = take_last_panic().expect("panic should be recorded");
        assert_eq!(record.message, "recorded boom");
        assert!(record.location.unwrap().contains("guard.rs"));
        assert!(take_last_panic().is_none());
    }

    #[test]
    fn recorder_is_per_thread() {
        install_panic_recorder();
        let _ = take_last_panic();
        std::thread::spawn(|| {
            let _ = panic::catch_unwind(|| panic!("other thread"));
        })
        .join()
        .unwrap();
        assert!(take_last_panic().is_none());
    }
}
