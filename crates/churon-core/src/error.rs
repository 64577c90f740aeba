//! Error types for module registration.

use thiserror::Error;

/// Why the native registration routine could not complete.
///
/// Any of these surfaces through the host's module-load failure path; the
/// load hook itself adds nothing on top.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("routine name is empty")]
    EmptyName,
    #[error("routine name `{name}` is not a valid host symbol")]
    InvalidName { name: String },
    #[error("routine `{name}` registered twice")]
    DuplicateRoutine { name: String },
    #[error("routine `{name}` takes {arity} arguments, host limit is {limit}")]
    TooManyArgs { name: String, arity: u8, limit: u8 },
    #[error("host primitive `{symbol}` is not available in this process")]
    HostUnavailable { symbol: &'static str },
    #[error("host rejected routine registration (status {status})")]
    HostRejected { status: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_routine() {
        let err = RegistrationError::DuplicateRoutine {
            name: "churon_abi_version".to_string(),
        };
        assert_eq!(err.to_string(), "routine `churon_abi_version` registered twice");

        let err = RegistrationError::TooManyArgs {
            name: "wide".to_string(),
            arity: 70,
            limit: 65,
        };
        assert_eq!(
            err.to_string(),
            "routine `wide` takes 70 arguments, host limit is 65"
        );
    }

    #[test]
    fn host_unavailable_mentions_symbol() {
        let err = RegistrationError::HostUnavailable {
            symbol: "R_registerRoutines",
        };
        assert!(err.to_string().contains("R_registerRoutines"));
    }
}
