//! Runtime configuration.
//!
//! Two environment variables control the bridge:
//!
//! - `CHURON_ABORT_POLICY`: what the abort bridge does.
//!   - `raise` (default): raise a host error and unwind into the host.
//!   - `terminate`: let the abort reach the OS default disposition, e.g. to
//!     get a core dump while debugging the native library.
//! - `CHURON_LOG`: structured log sink.
//!   - unset or `off`: no logging.
//!   - `stderr`: JSONL lines on standard error.
//!   - anything else: path of a JSONL file, opened in append mode.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

pub const ABORT_POLICY_ENV: &str = "CHURON_ABORT_POLICY";
pub const LOG_ENV: &str = "CHURON_LOG";

/// What the abort bridge does once it has intercepted an abort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortPolicy {
    /// Raise a host error carrying the fixed abort message.
    #[default]
    RaiseHostError,
    /// Terminate with the default abort disposition.
    Terminate,
}

impl AbortPolicy {
    /// Parse from string (case-insensitive). Unknown values fall back to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "raise" | "error" | "host" | "default" => Self::RaiseHostError,
            "terminate" | "abort" | "crash" | "off" => Self::Terminate,
            _ => Self::RaiseHostError,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RaiseHostError => "raise",
            Self::Terminate => "terminate",
        }
    }
}

// Atomic cache: 0=unresolved, 1=RaiseHostError, 2=Terminate, 255=resolving.
// The abort bridge reads this, possibly while the allocator or a lock is in a
// broken state, so it must never block: a reader that sees RESOLVING gets the
// default instead of waiting on a OnceLock futex.
static CACHED_POLICY: AtomicU8 = AtomicU8::new(0);

const POLICY_UNRESOLVED: u8 = 0;
const POLICY_RAISE: u8 = 1;
const POLICY_TERMINATE: u8 = 2;
const POLICY_RESOLVING: u8 = 255;

fn policy_to_u8(policy: AbortPolicy) -> u8 {
    match policy {
        AbortPolicy::RaiseHostError => POLICY_RAISE,
        AbortPolicy::Terminate => POLICY_TERMINATE,
    }
}

fn u8_to_policy(v: u8) -> AbortPolicy {
    match v {
        POLICY_TERMINATE => AbortPolicy::Terminate,
        _ => AbortPolicy::RaiseHostError,
    }
}

/// Configured abort policy (reads the environment on first call, cached thereafter).
#[must_use]
pub fn abort_policy() -> AbortPolicy {
    let cached = CACHED_POLICY.load(Ordering::Acquire);

    if cached != POLICY_UNRESOLVED && cached != POLICY_RESOLVING {
        return u8_to_policy(cached);
    }

    if cached == POLICY_RESOLVING {
        return AbortPolicy::default();
    }

    if CACHED_POLICY
        .compare_exchange(
            POLICY_UNRESOLVED,
            POLICY_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_POLICY.load(Ordering::Acquire);
        return if v != POLICY_UNRESOLVED && v != POLICY_RESOLVING {
            u8_to_policy(v)
        } else {
            AbortPolicy::default()
        };
    }

    let policy = std::env::var(ABORT_POLICY_ENV)
        .map(|v| AbortPolicy::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_POLICY.store(policy_to_u8(policy), Ordering::Release);
    policy
}

/// Pin the abort policy, bypassing the environment. Used by embedders and tests.
pub fn set_abort_policy(policy: AbortPolicy) {
    CACHED_POLICY.store(policy_to_u8(policy), Ordering::Release);
}

/// Where structured log lines go.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum LogTarget {
    #[default]
    Off,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "off" | "none" | "0" | "false" => Self::Off,
            "stderr" | "-" => Self::Stderr,
            _ => Self::File(PathBuf::from(trimmed)),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(LOG_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}
