//! Per-platform interception strategy.
//!
//! Every platform gets the scoped guard around registered routines. The
//! process-abort shadow is only installed where the host relies on catching
//! `abort`: on Windows the host runs native code under structured exception
//! handling, so shadowing `abort` there would change behavior for nothing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptStrategy {
    /// Panics are caught at routine boundaries only.
    ScopedGuard,
    /// Scoped guard plus a module-local `abort` override.
    ScopedGuardWithAbortShadow,
}

impl InterceptStrategy {
    #[must_use]
    pub const fn shadows_abort(self) -> bool {
        matches!(self, Self::ScopedGuardWithAbortShadow)
    }
}

/// Strategy for a Rust `target_os` value.
#[must_use]
pub fn strategy_for_target(target_os: &str) -> InterceptStrategy {
    match target_os {
        "windows" => InterceptStrategy::ScopedGuard,
        _ => InterceptStrategy::ScopedGuardWithAbortShadow,
    }
}

/// Whether an artifact built for `target_os` must carry the abort override.
#[must_use]
pub fn abort_shadow_expected(target_os: &str) -> bool {
    strategy_for_target(target_os).shadows_abort()
}

/// Strategy of the platform this crate was compiled for.
#[must_use]
pub const fn current_strategy() -> InterceptStrategy {
    if cfg!(windows) {
        InterceptStrategy::ScopedGuard
    } else {
        InterceptStrategy::ScopedGuardWithAbortShadow
    }
}
