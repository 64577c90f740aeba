//! Native failure classification and host-facing messages.

use std::any::Any;
use std::fmt;

use crate::error::RegistrationError;

/// Fixed message raised into the host when native code calls `abort`.
pub const ABORT_MESSAGE: &str = "Rust panic: Aborting churon execution";

/// Diagnostic written when the host raise primitive returns to the bridge.
pub const HOST_RETURNED_MESSAGE: &str =
    "churon: host error primitive returned control to the abort bridge";

/// Upper bound on a message handed to the host, in bytes.
pub const MAX_HOST_MESSAGE_BYTES: usize = 1024;

/// Extract a human-readable message from a panic payload.
#[must_use]
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "<non-string panic payload>".to_string()
}

/// Make a message safe to pass as a C string to the host.
///
/// Interior NUL bytes are dropped and the result is cut at
/// [`MAX_HOST_MESSAGE_BYTES`] on a char boundary.
#[must_use]
pub fn sanitize_for_host(message: &str) -> String {
    let mut out = String::with_capacity(message.len().min(MAX_HOST_MESSAGE_BYTES));
    for ch in message.chars().filter(|&c| c != '\0') {
        if out.len() + ch.len_utf8() > MAX_HOST_MESSAGE_BYTES {
            break;
        }
        out.push(ch);
    }
    out
}

/// An unrecoverable failure in native code, as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeFailure {
    /// A Rust panic caught at a routine boundary.
    Panic { routine: String, detail: String },
    /// Native code reached the process abort primitive.
    Abort,
    /// The registration routine failed during module load.
    Registration(RegistrationError),
}

impl NativeFailure {
    #[must_use]
    pub fn panic(routine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Panic {
            routine: routine.into(),
            detail: detail.into(),
        }
    }

    /// Short event kind for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Panic { .. } => "panic",
            Self::Abort => "abort",
            Self::Registration(_) => "registration",
        }
    }

    /// Message raised into the host, already sanitized.
    #[must_use]
    pub fn host_message(&self) -> String {
        sanitize_for_host(&self.to_string())
    }
}

impl fmt::Display for NativeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic { routine, detail } => {
                write!(f, "Rust panic in `{routine}`: {detail}")
            }
            Self::Abort => f.write_str(ABORT_MESSAGE),
            Self::Registration(err) => write!(f, "churon: routine registration failed: {err}"),
        }
    }
}

impl From<RegistrationError> for NativeFailure {
    fn from(err: RegistrationError) -> Self {
        Self::Registration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_message_handles_common_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static boom");
        assert_eq!(payload_message(&*s), "static boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(payload_message(&*owned), "owned boom");

        let other: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(payload_message(&*other), "<non-string panic payload>");
    }

    #[test]
    fn captured_payload_from_real_panic() {
        let payload = std::panic::catch_unwind(|| panic!("index {} out of range", 7)).unwrap_err();
        assert_eq!(payload_message(&*payload), "index 7 out of range");
    }

    #[test]
    fn panic_and_abort_messages_identify_native_panics() {
        let panic = NativeFailure::panic("churon_selftest_panic", "boom");
        assert_eq!(
            panic.host_message(),
            "Rust panic in `churon_selftest_panic`: boom"
        );
        assert_eq!(NativeFailure::Abort.host_message(), ABORT_MESSAGE);
        for failure in [panic, NativeFailure::Abort] {
            assert!(failure.host_message().contains("panic"));
        }
    }

    #[test]
    fn registration_failure_wraps_error() {
        let failure = NativeFailure::from(RegistrationError::EmptyName);
        assert_eq!(failure.kind(), "registration");
        assert_eq!(
            failure.to_string(),
            "churon: routine registration failed: routine name is empty"
        );
    }

    #[test]
    fn sanitize_strips_nul_and_truncates_on_char_boundary() {
        assert_eq!(sanitize_for_host("a\0b"), "ab");

        let long = "é".repeat(MAX_HOST_MESSAGE_BYTES);
        let cut = sanitize_for_host(&long);
        assert!(cut.len() <= MAX_HOST_MESSAGE_BYTES);
        assert_eq!(cut.len() % 2, 0);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
