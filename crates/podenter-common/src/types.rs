//! Domain primitive types used across the podenter workspace.

use std::ffi::{OsStr, OsString};
use std::fmt;

use nix::unistd::Pid;

/// Opaque identifier of a pod, as handed to us by the orchestrator.
///
/// Only used to compute paths inside the pod filesystem, so the raw bytes
/// are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodId(OsString);

impl PodId {
    /// Creates a new pod ID.
    #[must_use]
    pub fn new(id: impl Into<OsString>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    #[must_use]
    pub fn as_os_str(&self) -> &OsStr {
        &self.0
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

/// Pid of the pod's namespace-owning leader process.
///
/// Only valid at the moment it was discovered: the pod may terminate at
/// any time afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaderPid(i32);

impl LeaderPid {
    /// Wraps a raw pid.
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Returns the raw pid.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Returns the pid as a `nix` [`Pid`].
    #[must_use]
    pub const fn as_pid(self) -> Pid {
        Pid::from_raw(self.0)
    }
}

impl fmt::Display for LeaderPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kernel namespace kinds joined when entering a pod.
///
/// User and cgroup namespaces are deliberately absent: the pod manager
/// does not create them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// System V IPC and POSIX message queues.
    Ipc,
    /// Hostname and NIS domain name.
    Uts,
    /// Network stack.
    Net,
    /// Process ids. Only affects children forked after the join.
    Pid,
    /// Mount table.
    Mnt,
}

impl NamespaceKind {
    /// Order in which namespaces are joined. Mount goes last: after it
    /// the `/proc` paths of the leader may no longer resolve.
    pub const JOIN_ORDER: [Self; 5] = [Self::Ipc, Self::Uts, Self::Net, Self::Pid, Self::Mnt];

    /// Name of the entry under `/proc/<pid>/ns/`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::Net => "net",
            Self::Pid => "pid",
            Self::Mnt => "mnt",
        }
    }

    /// Zero-based position of this kind in [`Self::JOIN_ORDER`].
    #[must_use]
    pub const fn join_position(self) -> i32 {
        match self {
            Self::Ipc => 0,
            Self::Uts => 1,
            Self::Net => 2,
            Self::Pid => 3,
            Self::Mnt => 4,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}
