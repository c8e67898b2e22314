//! Re-rooting into the leader's filesystem via `/proc/<pid>/root`.
//!
//! `chroot(2)` is enough here: the mount namespace is already the pod's,
//! so there is no host mount left to hide behind a `pivot_root(2)`.

use podenter_common::error::Result;
use podenter_common::types::LeaderPid;

use crate::namespace::NamespaceSyscalls;

/// Open handle on the leader's root directory.
///
/// Must be opened before the mount namespace is joined, and consumed by
/// [`RootHandle::enter`] after every namespace is joined.
#[derive(Debug)]
pub struct RootHandle<H> {
    handle: H,
    leader: LeaderPid,
}

impl<H> RootHandle<H> {
    /// Opens `/proc/<leader>/root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be opened.
    pub fn open<S>(sys: &mut S, leader: LeaderPid) -> Result<Self>
    where
        S: NamespaceSyscalls<Handle = H>,
    {
        let handle = sys.open_root(leader)?;
        Ok(Self { handle, leader })
    }

    /// Leader whose root this is.
    #[must_use]
    pub const fn leader(&self) -> LeaderPid {
        self.leader
    }

    /// Changes directory to the root, chroots into it and closes it.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three steps fails. Later steps are
    /// not attempted.
    pub fn enter<S>(self, sys: &mut S) -> Result<()>
    where
        S: NamespaceSyscalls<Handle = H>,
    {
        sys.change_dir(&self.handle)?;
        sys.change_root()?;
        sys.release(self.handle)?;
        tracing::info!(leader = %self.leader, "re-rooted into pod filesystem");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::fake::{Call, Handle, Recorder};

    #[test]
    fn enter_runs_chdir_chroot_release_in_order() {
        let mut sys = Recorder::default();
        let root = RootHandle::open(&mut sys, LeaderPid::from_raw(9)).expect("open");
        assert_eq!(root.leader(), LeaderPid::from_raw(9));
        assert_eq!(root.handle, Handle::Root);
        root.enter(&mut sys).expect("enter");
        assert_eq!(
            sys.calls,
            [Call::OpenRoot, Call::ChangeDir, Call::ChangeRoot, Call::Release]
        );
    }

    #[test]
    fn failed_chroot_keeps_handle_unreleased() {
        let mut sys = Recorder::failing_at(Call::ChangeRoot);
        let root = RootHandle::open(&mut sys, LeaderPid::from_raw(9)).expect("open");
        assert!(root.enter(&mut sys).is_err());
        assert!(!sys.calls.contains(&Call::Release));
    }
}
