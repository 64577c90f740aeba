//! # churon-core
//!
//! Safe model for the churon panic-to-host-error bridge.
//!
//! The bridge sits between a host runtime (R) and native Rust code loaded into
//! it as a shared object. It has two jobs:
//!
//! ```text
//! host dyn.load -> R_init_churon -> native registration routine -> routine table
//! native panic / abort -> bridge -> host raise primitive (never returns)
//! ```
//!
//! This crate owns everything that can be expressed without `unsafe`: the
//! opaque module handle, the routine table, failure messages, runtime
//! configuration, the per-platform interception strategy and structured
//! logging. The FFI surfaces live in `churon-native` and `churon-abi`.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod failure;
pub mod handle;
pub mod platform;
pub mod registry;
pub mod structured_log;

pub use error::RegistrationError;
pub use failure::{ABORT_MESSAGE, NativeFailure};
pub use handle::ModuleHandle;
pub use registry::{NativeEntry, RoutineEntry, RoutineTable, RoutineTableBuilder};
