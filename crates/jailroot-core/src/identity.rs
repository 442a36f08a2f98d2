//! Resolution of user and group specifiers against the system identity
//! database.
//!
//! A specifier is tried as a name first; the numeric reading only applies
//! when no such name exists and the specifier begins with a decimal digit.
//! A group that is actually named `1000` therefore shadows GID 1000.

use jailroot_common::error::{JailError, Result};
use nix::unistd::{Gid, Group, Uid, User};

/// Full user-database record, as resolved for full-identity mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Login name, needed by the group-membership initializer.
    pub name: String,
    /// User ID.
    pub uid: Uid,
    /// Primary group ID from the user's database entry.
    pub gid: Gid,
}

/// Name-lookup access to the system user/group database.
///
/// Production code uses [`SystemIdentity`]; tests substitute an in-memory
/// fake.
pub trait IdentitySource {
    /// Looks up a group by name, returning its GID.
    fn group_by_name(&self, name: &str) -> Option<Gid>;

    /// Looks up a user by name, returning its full record.
    fn user_by_name(&self, name: &str) -> Option<UserRecord>;
}

/// [`IdentitySource`] backed by the host's user/group database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn group_by_name(&self, name: &str) -> Option<Gid> {
        // A database error is indistinguishable from an absent entry here;
        // the numeric fallback still gets its chance.
        Group::from_name(name).ok().flatten().map(|g| g.gid)
    }

    fn user_by_name(&self, name: &str) -> Option<UserRecord> {
        User::from_name(name).ok().flatten().map(|u| UserRecord {
            name: u.name,
            uid: u.uid,
            gid: u.gid,
        })
    }
}

fn leads_with_digit(spec: &str) -> bool {
    spec.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Parses a digit-leading specifier as a raw ID.
///
/// The parse must consume the whole specifier and fit the platform's ID
/// width; `+`/`-` signs never reach this point because of the digit gate.
fn parse_numeric(spec: &str) -> Option<u32> {
    spec.parse::<u32>().ok()
}

/// Resolves a group specifier to a GID.
///
/// # Errors
///
/// Returns [`JailError::InvalidGroupId`] for a malformed or overflowing
/// numeric form and [`JailError::NoSuchGroup`] for an unknown name.
pub fn resolve_group(db: &dyn IdentitySource, spec: &str) -> Result<Gid> {
    if let Some(gid) = db.group_by_name(spec) {
        return Ok(gid);
    }
    if leads_with_digit(spec) {
        return parse_numeric(spec)
            .map(Gid::from_raw)
            .ok_or_else(|| JailError::InvalidGroupId {
                spec: spec.to_owned(),
            });
    }
    Err(JailError::NoSuchGroup {
        spec: spec.to_owned(),
    })
}

/// Resolves a user specifier to a UID.
///
/// # Errors
///
/// Returns [`JailError::InvalidUserId`] for a malformed or overflowing
/// numeric form and [`JailError::NoSuchUser`] for an unknown name.
pub fn resolve_user(db: &dyn IdentitySource, spec: &str) -> Result<Uid> {
    if let Some(record) = db.user_by_name(spec) {
        return Ok(record.uid);
    }
    if leads_with_digit(spec) {
        return parse_numeric(spec)
            .map(Uid::from_raw)
            .ok_or_else(|| JailError::InvalidUserId {
                spec: spec.to_owned(),
            });
    }
    Err(JailError::NoSuchUser {
        spec: spec.to_owned(),
    })
}

/// Resolves a full-identity specifier to its complete database record.
///
/// Full-identity mode has no numeric fallback: the primary group comes
/// from the user's database entry, so the name must exist.
///
/// # Errors
///
/// Returns [`JailError::NoSuchUser`] if the name is not in the database.
pub fn resolve_full_user(db: &dyn IdentitySource, spec: &str) -> Result<UserRecord> {
    db.user_by_name(spec).ok_or_else(|| JailError::NoSuchUser {
        spec: spec.to_owned(),
    })
}
