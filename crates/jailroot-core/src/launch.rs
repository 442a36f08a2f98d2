//! Process-image replacement after the transition completes.
//!
//! Either the requested command or an interactive fallback shell is
//! exec'd via the search path. There is no recovery: if the exec call
//! returns at all, it failed.

use std::env;
use std::ffi::CString;
use std::io;

use jailroot_common::constants::{DEFAULT_SHELL, SHELL_ENV, SHELL_INTERACTIVE_FLAG};
use jailroot_common::error::JailError;

/// What to exec once the process is confined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchSpec {
    /// An explicit command with its arguments, resolved via `$PATH`.
    Command(Vec<String>),
    /// An interactive fallback shell.
    Shell(String),
}

impl LaunchSpec {
    /// Picks the command if one was given, otherwise the interactive
    /// shell from `shell_env` (falling back to `/bin/sh`).
    #[must_use]
    pub fn from_command(command: Vec<String>, shell_env: Option<String>) -> Self {
        if command.is_empty() {
            Self::Shell(shell_env.unwrap_or_else(|| DEFAULT_SHELL.to_owned()))
        } else {
            Self::Command(command)
        }
    }

    /// Builds the spec with the shell taken from `$SHELL`.
    #[must_use]
    pub fn from_env(command: Vec<String>) -> Self {
        Self::from_command(command, env::var(SHELL_ENV).ok())
    }

    /// The argv this spec execs, program name first.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Command(args) => args.clone(),
            Self::Shell(shell) => vec![shell.clone(), SHELL_INTERACTIVE_FLAG.to_owned()],
        }
    }

    /// Replaces the current process image.
    ///
    /// On success this never returns; the returned error means the exec
    /// itself failed. A command with no program at all fails the same
    /// way ([`from_command`](Self::from_command) never builds one, but
    /// the variant is public).
    pub fn exec(&self) -> JailError {
        let argv = self.argv();
        let Some(program) = argv.first().cloned() else {
            return JailError::Launch {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            };
        };

        let args: Vec<CString> = match argv
            .iter()
            .map(|a| CString::new(a.as_str()))
            .collect::<std::result::Result<_, _>>()
        {
            Ok(args) => args,
            Err(err) => {
                return JailError::Launch {
                    program,
                    source: io::Error::new(io::ErrorKind::InvalidInput, err),
                };
            }
        };

        tracing::debug!(%program, "replacing process image");
        match nix::unistd::execvp(&args[0], &args) {
            Ok(never) => match never {},
            Err(errno) => JailError::Launch {
                program,
                source: errno.into(),
            },
        }
    }
}
