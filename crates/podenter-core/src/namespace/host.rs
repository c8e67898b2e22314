//! Namespace syscalls against the running kernel.

use std::fs::File;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd};

use nix::errno::Errno;
use podenter_common::error::{EnterError, Result};
use podenter_common::types::{LeaderPid, NamespaceKind};

use super::{NamespaceSyscalls, clone_flag};
use crate::procfs::ProcFs;

/// Performs the real `setns(2)`, `fchdir(2)` and `chroot(2)` calls,
/// resolving leader paths through `proc`.
#[derive(Debug, Clone, Default)]
pub struct HostSyscalls {
    proc: ProcFs,
}

impl HostSyscalls {
    /// Creates host syscalls resolving paths through `proc`.
    #[must_use]
    pub const fn new(proc: ProcFs) -> Self {
        Self { proc }
    }
}

impl NamespaceSyscalls for HostSyscalls {
    type Handle = OwnedFd;

    fn open_root(&mut self, leader: LeaderPid) -> Result<OwnedFd> {
        let path = self.proc.root_path(leader);
        let file = File::open(&path).map_err(|source| EnterError::OpenRoot { path, source })?;
        tracing::debug!(%leader, "opened pod root");
        Ok(file.into())
    }

    fn open_namespace(&mut self, leader: LeaderPid, kind: NamespaceKind) -> Result<OwnedFd> {
        let path = self.proc.namespace_path(leader, kind);
        File::open(&path)
            .map(OwnedFd::from)
            .map_err(|source| EnterError::OpenNamespace { kind, path, source })
    }

    fn join(&mut self, namespace: OwnedFd, kind: NamespaceKind) -> Result<()> {
        nix::sched::setns(&namespace, clone_flag(kind))
            .map_err(|source| EnterError::JoinNamespace { kind, source })
    }

    fn change_dir(&mut self, root: &OwnedFd) -> Result<()> {
        // SAFETY: `root` is an open descriptor owned by the caller for the
        // duration of the call.
        let res = unsafe { libc::fchdir(root.as_raw_fd()) };
        Errno::result(res)
            .map(drop)
            .map_err(|source| EnterError::ChangeDir { source })
    }

    fn change_root(&mut self) -> Result<()> {
        nix::unistd::chroot(".").map_err(|source| EnterError::ChangeRoot { source })
    }

    fn release(&mut self, root: OwnedFd) -> Result<()> {
        let fd = root.into_raw_fd();
        // SAFETY: ownership of `fd` was just released by `into_raw_fd`, so
        // nothing else closes it.
        let res = unsafe { libc::close(fd) };
        Errno::result(res)
            .map(drop)
            .map_err(|source| EnterError::ReleaseRoot { source })
    }
}
