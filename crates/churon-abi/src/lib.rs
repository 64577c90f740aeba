// The exported entry points take raw pointers from the host; their contracts
// are the host's, so per-function safety docs would repeat the host headers.
#![allow(clippy::missing_safety_doc)]
//! # churon
//!
//! The shared object the host loads as the `churon` module.
//!
//! ```text
//! host dyn.load -> R_init_churon (this crate) -> R_init_churon_extendr (churon-native)
//!                                                  -> R_registerRoutines
//!
//! native panic  -> scoped guard (churon-native) -> Rf_error
//! native abort  -> abort override (this crate)  -> Rf_error
//! ```
//!
//! Only the load hook is part of the host contract. The `abort` override is
//! compiled on non-Windows targets and binds only inside this object.

pub mod abort_bridge;
pub mod load_hook;

pub use abort_bridge::{ABORT_SHADOW_INSTALLED, intercept_abort};
pub use load_hook::{LOAD_HOOK_SYMBOL, R_init_churon, set_registrar_for_tests};
