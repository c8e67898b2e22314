//! Unified error type and exit-code table for the podenter workspace.
//!
//! Entering a pod has no recoverable errors: every [`EnterError`] ends the
//! process. What the caller gets back is the stderr diagnostic and an exit
//! code telling which check failed. Codes follow the order in which the
//! checks run, so a higher code means the failure happened later.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::types::NamespaceKind;

/// Exit code used when the workload outcome could not be mirrored.
pub const EXIT_FAILURE: i32 = 1;

/// A fatal check performed while entering a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Command line could not be parsed.
    Usage,
    /// Configuration file or flag was invalid.
    Config,
    /// An argument could not be passed to `execv(2)`.
    BuildArgv,
    /// The leader marker exists but could not be read.
    ReadMarker,
    /// The leader marker does not hold a pid.
    ParseMarker,
    /// The pod went away while we were looking for its leader.
    PodTerminated,
    /// The kernel does not expose `/proc/<pid>/task/<tid>/children`.
    ChildEnumerationUnsupported,
    /// The children list of the supervisor could not be read.
    ReadChildren,
    /// The children list holds something other than pids.
    ParseChildren,
    /// The supervisor has more than one child.
    MultipleChildren,
    /// An `exe` link could not be resolved.
    ReadExeLink,
    /// The leader's root could not be opened.
    OpenRoot,
    /// A namespace file could not be opened.
    OpenNamespace(NamespaceKind),
    /// `setns(2)` failed.
    JoinNamespace(NamespaceKind),
    /// `fchdir(2)` to the leader's root failed.
    ChangeDir,
    /// `chroot(2)` failed.
    ChangeRoot,
    /// Closing the root handle failed.
    ReleaseRoot,
    /// `fork(2)` failed.
    Fork,
    /// `execv(2)` of the entry helper failed.
    Exec,
    /// `waitpid(2)` failed.
    Wait,
    /// Stopping ourselves or resuming the workload failed.
    Relay,
}

impl Checkpoint {
    const NAMESPACE_BASE: i32 = 13;
    const AFTER_NAMESPACES: i32 = Self::NAMESPACE_BASE + 2 * 5;

    /// Process exit code reported for this check.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Usage => 1,
            Self::Config => 2,
            Self::BuildArgv => 3,
            Self::ReadMarker => 4,
            Self::ParseMarker => 5,
            Self::PodTerminated => 6,
            Self::ChildEnumerationUnsupported => 7,
            Self::ReadChildren => 8,
            Self::ParseChildren => 9,
            Self::MultipleChildren => 10,
            Self::ReadExeLink => 11,
            Self::OpenRoot => 12,
            Self::OpenNamespace(kind) => Self::NAMESPACE_BASE + 2 * kind.join_position(),
            Self::JoinNamespace(kind) => Self::NAMESPACE_BASE + 2 * kind.join_position() + 1,
            Self::ChangeDir => Self::AFTER_NAMESPACES,
            Self::ChangeRoot => Self::AFTER_NAMESPACES + 1,
            Self::ReleaseRoot => Self::AFTER_NAMESPACES + 2,
            Self::Fork => Self::AFTER_NAMESPACES + 3,
            Self::Exec => Self::AFTER_NAMESPACES + 4,
            Self::Wait => Self::AFTER_NAMESPACES + 5,
            Self::Relay => Self::AFTER_NAMESPACES + 6,
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum EnterError {
    /// Not enough positional arguments.
    #[error("usage: {program} <pod-id> <cmd> [args...]")]
    Usage {
        /// Name the binary was invoked as.
        program: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The leader marker exists but reading it failed.
    #[error("unable to open ppid file {}", .path.display())]
    ReadMarker {
        /// Marker path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The leader marker does not start with a positive integer.
    #[error("unable to read ppid from {}: {content:?}", .path.display())]
    ParseMarker {
        /// Marker path.
        path: PathBuf,
        /// Raw marker content.
        content: String,
    },

    /// The process named by the marker is gone.
    #[error("the pod has terminated (ppid={ppid})")]
    SupervisorGone {
        /// Pid read from the marker.
        ppid: i32,
    },

    /// The liveness check reported the pod as stopped while polling.
    #[error("the pod is no longer running (while waiting for {waiting_for})")]
    PodNotRunning {
        /// What discovery was waiting for.
        waiting_for: &'static str,
    },

    /// Child enumeration is not compiled into the kernel.
    #[error(
        "unable to read {}: does your kernel have CONFIG_CHECKPOINT_RESTORE?",
        .path.display()
    )]
    ChildEnumerationUnsupported {
        /// Probed path.
        path: PathBuf,
    },

    /// The children list could not be read.
    #[error("unable to open {}", .path.display())]
    ReadChildren {
        /// Children list path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The children list holds something other than pids.
    #[error("unable to find children of process {ppid}: {content:?}")]
    ParseChildren {
        /// Supervisor pid.
        ppid: i32,
        /// Raw list content.
        content: String,
    },

    /// The supervisor has more than one child, so the leader is ambiguous.
    #[error("process {ppid} has {} children, expected exactly one: {children:?}", .children.len())]
    MultipleChildren {
        /// Supervisor pid.
        ppid: i32,
        /// Every listed child.
        children: Vec<i32>,
    },

    /// An `exe` link could not be resolved.
    #[error("cannot read link {}", .path.display())]
    ReadExeLink {
        /// Link path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The leader's root could not be opened.
    #[error("unable to open {}", .path.display())]
    OpenRoot {
        /// Root link path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A namespace file could not be opened.
    #[error("unable to open {}", .path.display())]
    OpenNamespace {
        /// Namespace kind.
        kind: NamespaceKind,
        /// Namespace file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `setns(2)` failed.
    #[error("unable to enter {kind} namespace")]
    JoinNamespace {
        /// Namespace kind.
        kind: NamespaceKind,
        /// Kernel error.
        source: Errno,
    },

    /// `fchdir(2)` to the leader's root failed.
    #[error("unable to chdir to pod root")]
    ChangeDir {
        /// Kernel error.
        source: Errno,
    },

    /// `chroot(2)` failed.
    #[error("unable to chroot")]
    ChangeRoot {
        /// Kernel error.
        source: Errno,
    },

    /// Closing the root handle failed.
    #[error("unable to close pod root handle")]
    ReleaseRoot {
        /// Kernel error.
        source: Errno,
    },

    /// An argument contains an interior NUL byte.
    #[error("argument cannot be passed to exec: {arg:?}")]
    BuildArgv {
        /// Lossy rendering of the argument.
        arg: String,
    },

    /// `fork(2)` failed.
    #[error("unable to fork")]
    Fork {
        /// Kernel error.
        source: Errno,
    },

    /// `execv(2)` of the entry helper failed.
    #[error("exec of {} failed", .helper.display())]
    Exec {
        /// Entry helper path.
        helper: PathBuf,
        /// Kernel error.
        source: Errno,
    },

    /// `waitpid(2)` failed.
    #[error("unable to wait for process {pid}")]
    Wait {
        /// Child pid.
        pid: i32,
        /// Kernel error.
        source: Errno,
    },

    /// Forwarding job control failed.
    #[error("unable to {action}")]
    Relay {
        /// What the relay was doing.
        action: &'static str,
        /// Kernel error.
        source: Errno,
    },
}

impl EnterError {
    /// The check this error failed.
    #[must_use]
    pub const fn checkpoint(&self) -> Checkpoint {
        match self {
            Self::Usage { .. } => Checkpoint::Usage,
            Self::Config { .. } => Checkpoint::Config,
            Self::ReadMarker { .. } => Checkpoint::ReadMarker,
            Self::ParseMarker { .. } => Checkpoint::ParseMarker,
            Self::SupervisorGone { .. } | Self::PodNotRunning { .. } => Checkpoint::PodTerminated,
            Self::ChildEnumerationUnsupported { .. } => Checkpoint::ChildEnumerationUnsupported,
            Self::ReadChildren { .. } => Checkpoint::ReadChildren,
            Self::ParseChildren { .. } => Checkpoint::ParseChildren,
            Self::MultipleChildren { .. } => Checkpoint::MultipleChildren,
            Self::ReadExeLink { .. } => Checkpoint::ReadExeLink,
            Self::OpenRoot { .. } => Checkpoint::OpenRoot,
            Self::OpenNamespace { kind, .. } => Checkpoint::OpenNamespace(*kind),
            Self::JoinNamespace { kind, .. } => Checkpoint::JoinNamespace(*kind),
            Self::ChangeDir { .. } => Checkpoint::ChangeDir,
            Self::ChangeRoot { .. } => Checkpoint::ChangeRoot,
            Self::ReleaseRoot { .. } => Checkpoint::ReleaseRoot,
            Self::BuildArgv { .. } => Checkpoint::BuildArgv,
            Self::Fork { .. } => Checkpoint::Fork,
            Self::Exec { .. } => Checkpoint::Exec,
            Self::Wait { .. } => Checkpoint::Wait,
            Self::Relay { .. } => Checkpoint::Relay,
        }
    }

    /// Process exit code reported for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.checkpoint().exit_code()
    }

    /// Renders the error and its whole source chain on one line.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

impl From<serde_json::Error> for EnterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EnterError>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn all_checkpoints() -> Vec<Checkpoint> {
        let mut all = vec![
            Checkpoint::Usage,
            Checkpoint::Config,
            Checkpoint::BuildArgv,
            Checkpoint::ReadMarker,
            Checkpoint::ParseMarker,
            Checkpoint::PodTerminated,
            Checkpoint::ChildEnumerationUnsupported,
            Checkpoint::ReadChildren,
            Checkpoint::ParseChildren,
            Checkpoint::MultipleChildren,
            Checkpoint::ReadExeLink,
            Checkpoint::OpenRoot,
        ];
        for kind in NamespaceKind::JOIN_ORDER {
            all.push(Checkpoint::OpenNamespace(kind));
            all.push(Checkpoint::JoinNamespace(kind));
        }
        all.extend([
            Checkpoint::ChangeDir,
            Checkpoint::ChangeRoot,
            Checkpoint::ReleaseRoot,
            Checkpoint::Fork,
            Checkpoint::Exec,
            Checkpoint::Wait,
            Checkpoint::Relay,
        ]);
        all
    }

    #[test]
    fn exit_codes_increase_in_check_order() {
        let codes: Vec<i32> = all_checkpoints().into_iter().map(Checkpoint::exit_code).collect();
        let expected: Vec<i32> = (1..=29).collect();
        assert_eq!(codes, expected);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes: HashSet<i32> = all_checkpoints().into_iter().map(Checkpoint::exit_code).collect();
        assert_eq!(codes.len(), all_checkpoints().len());
    }

    #[test]
    fn namespace_errors_carry_their_kind() {
        let err = EnterError::JoinNamespace {
            kind: NamespaceKind::Net,
            source: Errno::EPERM,
        };
        assert_eq!(err.checkpoint(), Checkpoint::JoinNamespace(NamespaceKind::Net));
        assert_eq!(err.exit_code(), 18);
    }

    #[test]
    fn both_termination_reasons_share_a_checkpoint() {
        let gone = EnterError::SupervisorGone { ppid: 12 };
        let stopped = EnterError::PodNotRunning {
            waiting_for: "the ppid marker",
        };
        assert_eq!(gone.exit_code(), stopped.exit_code());
    }

    #[test]
    fn diagnostic_includes_os_error_text() {
        let err = EnterError::ChangeRoot {
            source: Errno::EPERM,
        };
        let text = err.diagnostic();
        assert!(text.starts_with("unable to chroot: "));
        assert!(text.contains("EPERM"));
    }

    #[test]
    fn serde_errors_become_config_errors() {
        let err: EnterError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.checkpoint(), Checkpoint::Config);
    }
}
