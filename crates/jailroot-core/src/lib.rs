//! # jailroot-core
//!
//! The parts of the jailroot launcher with real correctness hazards:
//!
//! - **Identity resolution**: group/user specifiers by name or numeric ID,
//!   with name lookup taking precedence over the numeric reading.
//! - **Privilege transition**: the strictly ordered group, supplementary
//!   group, root, then user changes, fatal on the first failing step.
//! - **Exec hand-off**: replacing the process image inside the new root.
//!
//! The system collaborators sit behind the [`identity::IdentitySource`]
//! and [`transition::ProcessControl`] traits, so the ordering invariants
//! can be asserted in tests without touching real process credentials.

pub mod identity;
pub mod launch;
pub mod tokens;
pub mod transition;
