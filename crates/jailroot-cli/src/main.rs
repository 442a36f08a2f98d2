//! # jailroot — change root, drop identity, exec.
//!
//! Launches a command (or an interactive shell) confined to a subtree of
//! the filesystem under a specific, typically unprivileged, identity.
//! All the actual work happens in `jailroot-core`; this binary parses
//! arguments, reports errors on stderr, and maps them to exit statuses.

mod cli;

use std::process::exit;

use clap::Parser;
use clap::error::ErrorKind;
use jailroot_common::constants::{BIN_NAME, EXIT_USAGE};
use jailroot_common::error::JailError;
use jailroot_core::identity::SystemIdentity;
use jailroot_core::launch::LaunchSpec;
use jailroot_core::transition::{self, IdentityMode, SystemProcess};

use crate::cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            exit(0);
        }
        Err(err) => {
            let _ = err.print();
            exit(EXIT_USAGE);
        }
    };

    // run() only comes back on failure; success replaces this process.
    let err = run(args);
    eprintln!("{}: {err}", program_name());
    exit(err.exit_code());
}

/// Resolves identities, performs the transition, and hands off.
fn run(args: Cli) -> JailError {
    let mode =
        match IdentityMode::from_options(args.group, args.supplementary, args.user, args.full_user)
        {
            Ok(mode) => mode,
            Err(err) => return err,
        };
    tracing::debug!(?mode, newroot = %args.newroot.display(), "transition planned");

    let db = SystemIdentity;
    let mut sys = SystemProcess;
    if let Err(err) = transition::apply(&mode, &args.newroot, &db, &mut sys) {
        return err;
    }

    LaunchSpec::from_env(args.command).exec()
}

/// The name the program was invoked as, used to prefix diagnostics.
fn program_name() -> String {
    std::env::args().next().unwrap_or_else(|| BIN_NAME.to_owned())
}
