//! Unified error types for the jailroot workspace.
//!
//! No failure in this program is recoverable: every variant is reported
//! once on stderr by the CLI driver and mapped to an exit status. System
//! call failures cross this crate's boundary as [`std::io::Error`] so the
//! leaf crate needs no system-call dependencies.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum JailError {
    /// A group specifier matched no group name and did not begin with a
    /// digit.
    #[error("no such group `{spec}`")]
    NoSuchGroup {
        /// The offending specifier.
        spec: String,
    },

    /// A user specifier matched no user name and did not begin with a
    /// digit.
    #[error("no such user `{spec}`")]
    NoSuchUser {
        /// The offending specifier.
        spec: String,
    },

    /// A digit-leading group specifier failed to parse as a numeric ID.
    #[error("invalid group ID `{spec}`")]
    InvalidGroupId {
        /// The offending specifier.
        spec: String,
    },

    /// A digit-leading user specifier failed to parse as a numeric ID.
    #[error("invalid user ID `{spec}`")]
    InvalidUserId {
        /// The offending specifier.
        spec: String,
    },

    /// More supplementary groups were listed than the platform allows.
    #[error("too many supplementary groups provided (limit {max})")]
    TooManyGroups {
        /// The platform's supplementary-group limit.
        max: usize,
    },

    /// A credential-changing system call failed.
    #[error("{op}: {source}")]
    Transition {
        /// The failing operation (`setgid`, `setgroups`, `initgroups`,
        /// or `setuid`).
        op: &'static str,
        /// Underlying system error.
        source: io::Error,
    },

    /// Changing the filesystem root or entering it failed.
    #[error("{}: {source}", path.display())]
    RootChange {
        /// The requested new root.
        path: PathBuf,
        /// Underlying system error.
        source: io::Error,
    },

    /// Replacing the process image failed (the exec call returned).
    #[error("{program}: {source}")]
    Launch {
        /// The program that could not be executed.
        program: String,
        /// Underlying system error.
        source: io::Error,
    },

    /// A full-identity specifier was combined with a separate-mode
    /// specifier.
    #[error("the -U option may not be combined with -g, -G, or -u")]
    ConflictingModes,
}

impl JailError {
    /// Exit status the CLI maps this error to.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConflictingModes => crate::constants::EXIT_USAGE,
            _ => crate::constants::EXIT_FAILURE,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, JailError>;
