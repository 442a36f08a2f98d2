//! # jailroot-common
//!
//! Shared error definitions and constants used across the jailroot
//! workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and stays free of system-call dependencies so the error
//! taxonomy and exit-code policy can be reused anywhere.

pub mod constants;
pub mod error;
