//! Joining the namespaces of a running pod.
//!
//! Provides the ordered `setns(2)` sequence followed by the re-root into
//! the leader's filesystem. The sequence cannot be rolled back: once the
//! first namespace is joined, any failure must end the process.

pub mod host;

use nix::sched::CloneFlags;
use podenter_common::error::Result;
use podenter_common::types::{LeaderPid, NamespaceKind};

use crate::filesystem::RootHandle;

pub use host::HostSyscalls;

/// `setns(2)` flag for a namespace kind.
#[must_use]
pub const fn clone_flag(kind: NamespaceKind) -> CloneFlags {
    match kind {
        NamespaceKind::Ipc => CloneFlags::CLONE_NEWIPC,
        NamespaceKind::Uts => CloneFlags::CLONE_NEWUTS,
        NamespaceKind::Net => CloneFlags::CLONE_NEWNET,
        NamespaceKind::Pid => CloneFlags::CLONE_NEWPID,
        NamespaceKind::Mnt => CloneFlags::CLONE_NEWNS,
    }
}

/// Kernel operations needed to enter a pod.
///
/// Implementors return the matching [`podenter_common::error::EnterError`]
/// variant for each failing step.
pub trait NamespaceSyscalls {
    /// Open descriptor on a `/proc/<pid>/...` entry.
    type Handle;

    /// Opens `/proc/<leader>/root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root link cannot be opened.
    fn open_root(&mut self, leader: LeaderPid) -> Result<Self::Handle>;

    /// Opens `/proc/<leader>/ns/<kind>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace file cannot be opened.
    fn open_namespace(&mut self, leader: LeaderPid, kind: NamespaceKind) -> Result<Self::Handle>;

    /// Moves the calling thread into the namespace and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if `setns(2)` fails.
    fn join(&mut self, namespace: Self::Handle, kind: NamespaceKind) -> Result<()>;

    /// `fchdir(2)` to the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be changed.
    fn change_dir(&mut self, root: &Self::Handle) -> Result<()>;

    /// `chroot(".")`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be changed.
    fn change_root(&mut self) -> Result<()>;

    /// Closes the root handle, reporting close errors.
    ///
    /// # Errors
    ///
    /// Returns an error if `close(2)` fails.
    fn release(&mut self, root: Self::Handle) -> Result<()>;
}

/// Joins the leader's IPC, UTS, network, PID and mount namespaces, then
/// re-roots into the leader's root filesystem.
///
/// The root handle is opened before the first join, while `/proc/<leader>/root`
/// still resolves through our original mount namespace, and consumed after
/// the last one. The first failure stops the sequence.
///
/// # Errors
///
/// Returns the error of the first failing step.
pub fn enter_namespaces<S: NamespaceSyscalls>(sys: &mut S, leader: LeaderPid) -> Result<()> {
    tracing::info!(%leader, "entering pod namespaces");
    let root = RootHandle::open(sys, leader)?;

    for kind in NamespaceKind::JOIN_ORDER {
        let namespace = sys.open_namespace(leader, kind)?;
        sys.join(namespace, kind)?;
        tracing::debug!(%leader, %kind, "joined namespace");
    }

    root.enter(sys)
}


#[cfg(test)]
mod tests {
    use podenter_common::error::Checkpoint;

    use super::fake::{Call, Recorder};
    use super::*;

    const LEADER: LeaderPid = LeaderPid::from_raw(4321);

    fn happy_path() -> Vec<Call> {
        let mut calls = vec![Call::OpenRoot];
        for kind in NamespaceKind::JOIN_ORDER {
            calls.push(Call::OpenNamespace(kind));
            calls.push(Call::Join(kind));
        }
        calls.extend([Call::ChangeDir, Call::ChangeRoot, Call::Release]);
        calls
    }

    #[test]
    fn joins_in_fixed_order_between_root_open_and_consume() {
        let mut sys = Recorder::default();
        enter_namespaces(&mut sys, LEADER).expect("enter");
        assert_eq!(sys.calls, happy_path());

        let joins: Vec<_> = sys
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Join(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            joins,
            [
                NamespaceKind::Ipc,
                NamespaceKind::Uts,
                NamespaceKind::Net,
                NamespaceKind::Pid,
                NamespaceKind::Mnt
            ]
        );
    }

    #[test]
    fn failing_join_stops_the_sequence() {
        for kind in NamespaceKind::JOIN_ORDER {
            let mut sys = Recorder::failing_at(Call::Join(kind));
            let err = enter_namespaces(&mut sys, LEADER).unwrap_err();
            assert_eq!(err.checkpoint(), Checkpoint::JoinNamespace(kind));
            assert_eq!(sys.calls.last(), Some(&Call::Join(kind)));
            assert!(!sys.calls.contains(&Call::ChangeDir));
            assert!(!sys.calls.contains(&Call::ChangeRoot));
        }
    }

    #[test]
    fn every_step_has_its_own_exit_code() {
        let codes: Vec<i32> = happy_path()
            .into_iter()
            .map(|call| {
                let mut sys = Recorder::failing_at(call);
                enter_namespaces(&mut sys, LEADER).unwrap_err().exit_code()
            })
            .collect();
        let mut sorted = codes.clone();
        sorted.dedup();
        assert_eq!(sorted, codes);
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn failing_root_open_joins_nothing() {
        let mut sys = Recorder::failing_at(Call::OpenRoot);
        let err = enter_namespaces(&mut sys, LEADER).unwrap_err();
        assert_eq!(err.checkpoint(), Checkpoint::OpenRoot);
        assert_eq!(sys.calls, [Call::OpenRoot]);
    }

    #[test]
    fn failing_chdir_skips_chroot() {
        let mut sys = Recorder::failing_at(Call::ChangeDir);
        let err = enter_namespaces(&mut sys, LEADER).unwrap_err();
        assert_eq!(err.checkpoint(), Checkpoint::ChangeDir);
        assert!(!sys.calls.contains(&Call::ChangeRoot));
    }

    #[test]
    fn clone_flags_match_kinds() {
        assert_eq!(clone_flag(NamespaceKind::Mnt), CloneFlags::CLONE_NEWNS);
        assert_eq!(clone_flag(NamespaceKind::Net), CloneFlags::CLONE_NEWNET);
    }
}
