//! Shared names, defaults, and process exit statuses.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "jailroot";

/// Environment variable consulted for the fallback interactive shell.
pub const SHELL_ENV: &str = "SHELL";

/// Shell used when `$SHELL` is unset.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Flag passed to the fallback shell to make it interactive.
pub const SHELL_INTERACTIVE_FLAG: &str = "-i";

/// Exit status for malformed invocations.
pub const EXIT_USAGE: i32 = 1;

/// Exit status for every operational failure: the all-ones status byte,
/// kept distinct from the usage code.
pub const EXIT_FAILURE: i32 = 255;
