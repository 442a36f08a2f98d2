//! Argument surface of the `jailroot` binary.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

/// Run a command, or an interactive shell, chrooted into a directory
/// under a chosen user and group identity.
#[derive(Parser, Debug)]
#[command(name = "jailroot", version, about, long_about = None)]
pub struct Cli {
    /// Primary group to switch to, by name or numeric GID.
    #[arg(short = 'g', value_name = "GROUP",
          value_parser = NonEmptyStringValueParser::new())]
    pub group: Option<String>,

    /// Comma-separated supplementary groups, each by name or numeric GID.
    #[arg(short = 'G', value_name = "GROUP,GROUP,...",
          value_parser = NonEmptyStringValueParser::new())]
    pub supplementary: Option<String>,

    /// User to switch to, by name or numeric UID.
    #[arg(short = 'u', value_name = "USER",
          value_parser = NonEmptyStringValueParser::new())]
    pub user: Option<String>,

    /// User whose full identity to assume: UID, primary group, and the
    /// group memberships recorded in the user database.
    #[arg(short = 'U', value_name = "USER",
          value_parser = NonEmptyStringValueParser::new(),
          conflicts_with_all = ["group", "supplementary", "user"])]
    pub full_user: Option<String>,

    /// Directory that becomes the new filesystem root.
    pub newroot: PathBuf,

    /// Command to run inside the new root; defaults to an interactive
    /// $SHELL.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
