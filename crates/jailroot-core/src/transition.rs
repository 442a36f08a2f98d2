//! The ordered privilege transition: group, supplementary groups, root,
//! then user.
//!
//! Every step is fatal on failure and nothing is rolled back; a
//! half-applied identity must never reach exec. The root change always
//! precedes the user-ID drop, because `chroot(2)` needs the privilege
//! that `setuid(2)` permanently gives up.

use std::io;
use std::path::Path;

use jailroot_common::error::{JailError, Result};
use nix::unistd::{Gid, Uid};

use crate::identity::{IdentitySource, resolve_full_user, resolve_group, resolve_user};
use crate::tokens::TokenSplitter;

/// Which flavor of identity change was requested.
///
/// The two modes are mutually exclusive by construction;
/// [`IdentityMode::from_options`] rejects a full-identity specifier
/// combined with any separate-mode specifier before any lookup happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    /// Independent `-g`, `-G`, and `-u` specifiers, each optional.
    Separate {
        /// Primary group specifier (`-g`).
        group: Option<String>,
        /// Comma-delimited supplementary group list (`-G`).
        supplementary: Option<String>,
        /// User specifier (`-u`).
        user: Option<String>,
    },
    /// A single `-U` specifier resolved to a user and its primary group.
    Full {
        /// Full-identity user specifier (`-U`).
        user: String,
    },
}

impl IdentityMode {
    /// Builds the mode from raw CLI options.
    ///
    /// # Errors
    ///
    /// Returns [`JailError::ConflictingModes`] if a full-identity
    /// specifier is combined with any separate-mode specifier.
    pub fn from_options(
        group: Option<String>,
        supplementary: Option<String>,
        user: Option<String>,
        full_user: Option<String>,
    ) -> Result<Self> {
        match full_user {
            Some(_) if group.is_some() || supplementary.is_some() || user.is_some() => {
                Err(JailError::ConflictingModes)
            }
            Some(full) => Ok(Self::Full { user: full }),
            None => Ok(Self::Separate {
                group,
                supplementary,
                user,
            }),
        }
    }
}

/// Credential- and root-changing process primitives.
///
/// Production code uses [`SystemProcess`]; tests substitute a recording
/// fake to assert the call sequence.
pub trait ProcessControl {
    /// Platform limit on the number of supplementary groups.
    fn max_groups(&self) -> usize;

    /// Sets the process's real and effective group ID.
    ///
    /// # Errors
    ///
    /// Returns the underlying system error.
    fn set_group_id(&mut self, gid: Gid) -> io::Result<()>;

    /// Replaces the process's supplementary group set in one call.
    ///
    /// # Errors
    ///
    /// Returns the underlying system error.
    fn set_supplementary_groups(&mut self, gids: &[Gid]) -> io::Result<()>;

    /// Installs the supplementary groups recorded in the database for
    /// `user`, plus `gid`.
    ///
    /// # Errors
    ///
    /// Returns the underlying system error.
    fn init_groups(&mut self, user: &str, gid: Gid) -> io::Result<()>;

    /// Changes the filesystem root to `path`, then the working directory
    /// to the new `/`.
    ///
    /// # Errors
    ///
    /// Returns the underlying system error.
    fn change_root(&mut self, path: &Path) -> io::Result<()>;

    /// Sets the process's real and effective user ID.
    ///
    /// # Errors
    ///
    /// Returns the underlying system error.
    fn set_user_id(&mut self, uid: Uid) -> io::Result<()>;
}

/// Supplementary-group limit used when `sysconf` cannot report one;
/// the Linux kernel value since 2.6.4.
const NGROUPS_MAX_FALLBACK: usize = 65536;

/// [`ProcessControl`] backed by the host kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

impl ProcessControl for SystemProcess {
    fn max_groups(&self) -> usize {
        nix::unistd::sysconf(nix::unistd::SysconfVar::NGROUPS_MAX)
            .ok()
            .flatten()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(NGROUPS_MAX_FALLBACK)
    }

    fn set_group_id(&mut self, gid: Gid) -> io::Result<()> {
        nix::unistd::setgid(gid)?;
        tracing::debug!(%gid, "primary group set");
        Ok(())
    }

    fn set_supplementary_groups(&mut self, gids: &[Gid]) -> io::Result<()> {
        nix::unistd::setgroups(gids)?;
        tracing::debug!(count = gids.len(), "supplementary groups set");
        Ok(())
    }

    fn init_groups(&mut self, user: &str, gid: Gid) -> io::Result<()> {
        let name = std::ffi::CString::new(user)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        nix::unistd::initgroups(&name, gid)?;
        tracing::debug!(user, %gid, "group membership initialized");
        Ok(())
    }

    fn change_root(&mut self, path: &Path) -> io::Result<()> {
        nix::unistd::chroot(path)?;
        nix::unistd::chdir("/")?;
        tracing::info!(path = %path.display(), "root changed");
        Ok(())
    }

    fn set_user_id(&mut self, uid: Uid) -> io::Result<()> {
        nix::unistd::setuid(uid)?;
        tracing::debug!(%uid, "user ID set");
        Ok(())
    }
}

/// Applies the complete transition: identity, root, then user ID.
///
/// The group phase depends on the mode; the tail is common to both and
/// keeps the one ordering that matters — the root change strictly before
/// the user-ID application.
///
/// # Errors
///
/// Returns the first failing step; nothing is rolled back.
pub fn apply(
    mode: &IdentityMode,
    newroot: &Path,
    db: &dyn IdentitySource,
    sys: &mut dyn ProcessControl,
) -> Result<()> {
    let uid = match mode {
        IdentityMode::Separate {
            group,
            supplementary,
            user,
        } => apply_separate(
            group.as_deref(),
            supplementary.as_deref(),
            user.as_deref(),
            db,
            sys,
        )?,
        IdentityMode::Full { user } => apply_full(user, db, sys)?,
    };

    sys.change_root(newroot)
        .map_err(|source| JailError::RootChange {
            path: newroot.to_path_buf(),
            source,
        })?;

    if let Some(uid) = uid {
        sys.set_user_id(uid)
            .map_err(|source| JailError::Transition {
                op: "setuid",
                source,
            })?;
    }

    Ok(())
}

/// Group and user resolution for separate mode; returns the UID to apply
/// after the root change, if any.
fn apply_separate(
    group: Option<&str>,
    supplementary: Option<&str>,
    user: Option<&str>,
    db: &dyn IdentitySource,
    sys: &mut dyn ProcessControl,
) -> Result<Option<Uid>> {
    let mut gids: Vec<Gid> = Vec::new();
    let mut primary = None;

    if let Some(spec) = group {
        let gid = resolve_group(db, spec)?;
        // Seed the supplementary set with the primary group so the process
        // keeps it in its group set alongside the -G entries.
        if supplementary.is_some() {
            gids.push(gid);
        }
        sys.set_group_id(gid)
            .map_err(|source| JailError::Transition {
                op: "setgid",
                source,
            })?;
        primary = Some(gid);
    }

    if let Some(list) = supplementary {
        collect_supplementary(list, primary, &mut gids, db, sys.max_groups())?;
    }

    if !gids.is_empty() {
        sys.set_supplementary_groups(&gids)
            .map_err(|source| JailError::Transition {
                op: "setgroups",
                source,
            })?;
    }

    user.map(|spec| resolve_user(db, spec)).transpose()
}

/// Full-identity mode: one lookup yields UID and primary GID, and the
/// database's group membership replaces an explicit list.
fn apply_full(
    spec: &str,
    db: &dyn IdentitySource,
    sys: &mut dyn ProcessControl,
) -> Result<Option<Uid>> {
    let record = resolve_full_user(db, spec)?;

    sys.set_group_id(record.gid)
        .map_err(|source| JailError::Transition {
            op: "setgid",
            source,
        })?;
    sys.init_groups(&record.name, record.gid)
        .map_err(|source| JailError::Transition {
            op: "initgroups",
            source,
        })?;

    Ok(Some(record.uid))
}

/// Tokenizes a `-G` list and resolves each entry, skipping empty tokens,
/// deduplicating the seeded primary group, and enforcing the platform
/// limit.
fn collect_supplementary(
    list: &str,
    primary: Option<Gid>,
    gids: &mut Vec<Gid>,
    db: &dyn IdentitySource,
    max: usize,
) -> Result<()> {
    for token in TokenSplitter::new(list, ",") {
        // Any token still pending once the set is full is fatal, never
        // silently truncated.
        if gids.len() >= max {
            return Err(JailError::TooManyGroups { max });
        }
        if token.is_empty() {
            continue;
        }
        let gid = resolve_group(db, token)?;
        if primary != Some(gid) {
            gids.push(gid);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::identity::UserRecord;

    #[derive(Default)]
    struct FakeIdentitySource {
        groups: HashMap<String, u32>,
        users: HashMap<String, (u32, u32)>,
    }

    impl FakeIdentitySource {
        fn with_group(mut self, name: &str, gid: u32) -> Self {
            let _ = self.groups.insert(name.to_owned(), gid);
            self
        }

        fn with_user(mut self, name: &str, uid: u32, gid: u32) -> Self {
            let _ = self.users.insert(name.to_owned(), (uid, gid));
            self
        }
    }

    impl IdentitySource for FakeIdentitySource {
        fn group_by_name(&self, name: &str) -> Option<Gid> {
            self.groups.get(name).copied().map(Gid::from_raw)
        }

        fn user_by_name(&self, name: &str) -> Option<UserRecord> {
            self.users.get(name).map(|&(uid, gid)| UserRecord {
                name: name.to_owned(),
                uid: Uid::from_raw(uid),
                gid: Gid::from_raw(gid),
            })
        }
    }

    /// One recorded process-control call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        SetGid(u32),
        SetGroups(Vec<u32>),
        InitGroups(String, u32),
        ChangeRoot(PathBuf),
        SetUid(u32),
    }

    /// [`ProcessControl`] fake that records every call in order and can be
    /// told to fail a given operation.
    struct RecordingProcess {
        ops: Vec<Op>,
        max: usize,
        fail_on: Option<&'static str>,
    }

    impl RecordingProcess {
        fn new() -> Self {
            Self {
                ops: Vec::new(),
                max: 16,
                fail_on: None,
            }
        }

        fn with_max_groups(mut self, max: usize) -> Self {
            self.max = max;
            self
        }

        fn failing_on(mut self, op: &'static str) -> Self {
            self.fail_on = Some(op);
            self
        }

        fn check(&self, op: &'static str) -> io::Result<()> {
            if self.fail_on == Some(op) {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                Ok(())
            }
        }
    }

    impl ProcessControl for RecordingProcess {
        fn max_groups(&self) -> usize {
            self.max
        }

        fn set_group_id(&mut self, gid: Gid) -> io::Result<()> {
            self.check("setgid")?;
            self.ops.push(Op::SetGid(gid.as_raw()));
            Ok(())
        }

        fn set_supplementary_groups(&mut self, gids: &[Gid]) -> io::Result<()> {
            self.check("setgroups")?;
            self.ops
                .push(Op::SetGroups(gids.iter().map(|g| g.as_raw()).collect()));
            Ok(())
        }

        fn init_groups(&mut self, user: &str, gid: Gid) -> io::Result<()> {
            self.check("initgroups")?;
            self.ops.push(Op::InitGroups(user.to_owned(), gid.as_raw()));
            Ok(())
        }

        fn change_root(&mut self, path: &Path) -> io::Result<()> {
            self.check("chroot")?;
            self.ops.push(Op::ChangeRoot(path.to_path_buf()));
            Ok(())
        }

        fn set_user_id(&mut self, uid: Uid) -> io::Result<()> {
            self.check("setuid")?;
            self.ops.push(Op::SetUid(uid.as_raw()));
            Ok(())
        }
    }

    fn separate(
        group: Option<&str>,
        supplementary: Option<&str>,
        user: Option<&str>,
    ) -> IdentityMode {
        IdentityMode::Separate {
            group: group.map(str::to_owned),
            supplementary: supplementary.map(str::to_owned),
            user: user.map(str::to_owned),
        }
    }

    #[test]
    fn separate_mode_runs_the_full_ordered_sequence() {
        let db = FakeIdentitySource::default()
            .with_group("staff", 50)
            .with_group("wheel", 10)
            .with_user("alice", 1000, 50);
        let mut sys = RecordingProcess::new();

        let mode = separate(Some("staff"), Some("wheel"), Some("alice"));
        apply(&mode, Path::new("/srv/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::SetGid(50),
                Op::SetGroups(vec![50, 10]),
                Op::ChangeRoot(PathBuf::from("/srv/jail")),
                Op::SetUid(1000),
            ]
        );
    }

    #[test]
    fn full_mode_runs_the_full_ordered_sequence() {
        let db = FakeIdentitySource::default().with_user("alice", 1000, 50);
        let mut sys = RecordingProcess::new();

        let mode = IdentityMode::Full {
            user: "alice".to_owned(),
        };
        apply(&mode, Path::new("/srv/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::SetGid(50),
                Op::InitGroups("alice".to_owned(), 50),
                Op::ChangeRoot(PathBuf::from("/srv/jail")),
                Op::SetUid(1000),
            ]
        );
    }

    #[test]
    fn root_change_precedes_user_id_in_both_modes() {
        for mode in [
            separate(None, None, Some("1000")),
            IdentityMode::Full {
                user: "alice".to_owned(),
            },
        ] {
            let db = FakeIdentitySource::default().with_user("alice", 1000, 50);
            let mut sys = RecordingProcess::new();
            apply(&mode, Path::new("/srv/jail"), &db, &mut sys).expect("transition should succeed");

            let root_at = sys
                .ops
                .iter()
                .position(|op| matches!(op, Op::ChangeRoot(_)))
                .expect("root change should be recorded");
            let uid_at = sys
                .ops
                .iter()
                .position(|op| matches!(op, Op::SetUid(_)))
                .expect("setuid should be recorded");
            assert!(root_at < uid_at, "root change must precede setuid");
        }
    }

    #[test]
    fn primary_group_is_not_duplicated_in_supplementary_set() {
        let db = FakeIdentitySource::default()
            .with_group("staff", 50)
            .with_group("wheel", 10);
        let mut sys = RecordingProcess::new();

        let mode = separate(Some("staff"), Some("staff,wheel,staff"), None);
        apply(&mode, Path::new("/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::SetGid(50),
                Op::SetGroups(vec![50, 10]),
                Op::ChangeRoot(PathBuf::from("/jail")),
            ]
        );
    }

    #[test]
    fn empty_tokens_in_the_list_are_skipped() {
        let db = FakeIdentitySource::default()
            .with_group("wheel", 10)
            .with_group("audio", 29);
        let mut sys = RecordingProcess::new();

        let mode = separate(None, Some("wheel,,audio,"), None);
        apply(&mode, Path::new("/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::SetGroups(vec![10, 29]),
                Op::ChangeRoot(PathBuf::from("/jail")),
            ]
        );
    }

    #[test]
    fn group_without_list_skips_setgroups_entirely() {
        let db = FakeIdentitySource::default().with_group("staff", 50);
        let mut sys = RecordingProcess::new();

        let mode = separate(Some("staff"), None, None);
        apply(&mode, Path::new("/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![Op::SetGid(50), Op::ChangeRoot(PathBuf::from("/jail"))]
        );
    }

    #[test]
    fn seeded_primary_alone_still_installs_the_set() {
        let db = FakeIdentitySource::default().with_group("staff", 50);
        let mut sys = RecordingProcess::new();

        let mode = separate(Some("staff"), Some("staff"), None);
        apply(&mode, Path::new("/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::SetGid(50),
                Op::SetGroups(vec![50]),
                Op::ChangeRoot(PathBuf::from("/jail")),
            ]
        );
    }

    #[test]
    fn list_past_the_platform_limit_is_fatal() {
        let db = FakeIdentitySource::default()
            .with_group("a", 1)
            .with_group("b", 2)
            .with_group("c", 3);
        let mut sys = RecordingProcess::new().with_max_groups(2);

        let mode = separate(None, Some("a,b,c"), None);
        let err = apply(&mode, Path::new("/jail"), &db, &mut sys)
            .expect_err("over-limit list should fail");

        assert!(matches!(err, JailError::TooManyGroups { max: 2 }));
        assert!(sys.ops.is_empty(), "no group set may be installed");
    }

    #[test]
    fn unresolvable_list_entry_is_fatal() {
        let db = FakeIdentitySource::default().with_group("wheel", 10);
        let mut sys = RecordingProcess::new();

        let mode = separate(None, Some("wheel,ghost"), None);
        let err = apply(&mode, Path::new("/jail"), &db, &mut sys)
            .expect_err("unknown group should fail");

        assert!(matches!(err, JailError::NoSuchGroup { spec } if spec == "ghost"));
        assert!(sys.ops.is_empty());
    }

    #[test]
    fn setgid_failure_aborts_before_any_other_step() {
        let db = FakeIdentitySource::default().with_group("staff", 50);
        let mut sys = RecordingProcess::new().failing_on("setgid");

        let mode = separate(Some("staff"), None, None);
        let err =
            apply(&mode, Path::new("/jail"), &db, &mut sys).expect_err("setgid failure is fatal");

        assert!(matches!(err, JailError::Transition { op: "setgid", .. }));
        assert!(sys.ops.is_empty(), "nothing may run after the failure");
    }

    #[test]
    fn root_change_failure_reports_the_path_and_skips_setuid() {
        let db = FakeIdentitySource::default().with_user("alice", 1000, 50);
        let mut sys = RecordingProcess::new().failing_on("chroot");

        let mode = separate(None, None, Some("alice"));
        let err =
            apply(&mode, Path::new("/srv/jail"), &db, &mut sys).expect_err("chroot failure is fatal");

        assert!(matches!(err, JailError::RootChange { path, .. } if path == Path::new("/srv/jail")));
        assert!(
            !sys.ops.iter().any(|op| matches!(op, Op::SetUid(_))),
            "setuid must not run after a failed root change"
        );
    }

    #[test]
    fn no_identity_flags_means_root_change_only() {
        let db = FakeIdentitySource::default();
        let mut sys = RecordingProcess::new();

        let mode = separate(None, None, None);
        apply(&mode, Path::new("/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(sys.ops, vec![Op::ChangeRoot(PathBuf::from("/jail"))]);
    }

    #[test]
    fn numeric_user_spec_applies_after_root_change() {
        let db = FakeIdentitySource::default();
        let mut sys = RecordingProcess::new();

        let mode = separate(None, None, Some("1000"));
        apply(&mode, Path::new("/srv/jail"), &db, &mut sys).expect("transition should succeed");

        assert_eq!(
            sys.ops,
            vec![
                Op::ChangeRoot(PathBuf::from("/srv/jail")),
                Op::SetUid(1000),
            ]
        );
    }

    #[test]
    fn full_mode_unknown_user_fails_before_any_call() {
        let db = FakeIdentitySource::default();
        let mut sys = RecordingProcess::new();

        let mode = IdentityMode::Full {
            user: "ghost".to_owned(),
        };
        let err =
            apply(&mode, Path::new("/jail"), &db, &mut sys).expect_err("unknown user should fail");

        assert!(matches!(err, JailError::NoSuchUser { spec } if spec == "ghost"));
        assert!(sys.ops.is_empty());
    }

    #[test]
    fn conflicting_modes_are_rejected_at_construction() {
        let err = IdentityMode::from_options(
            Some("staff".to_owned()),
            None,
            None,
            Some("alice".to_owned()),
        )
        .expect_err("-U with -g must be rejected");

        assert!(matches!(err, JailError::ConflictingModes));
    }

    #[test]
    fn platform_group_limit_is_a_usable_capacity() {
        // POSIX guarantees at least 8; sysconf failure falls back to the
        // kernel constant, so the capacity is never zero.
        let sys = SystemProcess;
        assert!(sys.max_groups() >= 8);
    }

    #[test]
    fn full_mode_alone_constructs() {
        let mode = IdentityMode::from_options(None, None, None, Some("alice".to_owned()))
            .expect("-U alone is valid");
        assert_eq!(
            mode,
            IdentityMode::Full {
                user: "alice".to_owned()
            }
        );
    }
}
