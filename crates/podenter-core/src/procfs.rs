//! Read-only access to the process table under `/proc`.
//!
//! The mount point is configurable so discovery can run against a fake
//! tree in tests.

use std::path::{Path, PathBuf};

use podenter_common::constants;
use podenter_common::error::{EnterError, Result};
use podenter_common::types::{LeaderPid, NamespaceKind};

/// Handle to a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    /// Uses the procfs mounted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mount point.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/proc/<pid>`.
    #[must_use]
    pub fn pid_dir(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Whether `/proc/<pid>` exists.
    ///
    /// Only a hint: the process may exit right after the check.
    #[must_use]
    pub fn is_alive(&self, pid: i32) -> bool {
        self.pid_dir(pid).exists()
    }

    /// Path probed to detect kernel child enumeration.
    #[must_use]
    pub fn child_enumeration_probe(&self) -> PathBuf {
        self.root.join(constants::CHILD_ENUMERATION_PROBE)
    }

    /// Fails unless the kernel exposes `task/<tid>/children`.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::ChildEnumerationUnsupported`] when the probe
    /// entry is missing.
    pub fn require_child_enumeration(&self) -> Result<()> {
        let probe = self.child_enumeration_probe();
        if probe.exists() {
            Ok(())
        } else {
            Err(EnterError::ChildEnumerationUnsupported { path: probe })
        }
    }

    /// `/proc/<pid>/task/<pid>/children`.
    #[must_use]
    pub fn children_path(&self, pid: i32) -> PathBuf {
        self.pid_dir(pid)
            .join("task")
            .join(pid.to_string())
            .join("children")
    }

    /// Lists the children of the main thread of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or holds anything
    /// other than whitespace-separated pids.
    pub fn children(&self, pid: i32) -> Result<Vec<i32>> {
        let path = self.children_path(pid);
        let content = std::fs::read_to_string(&path)
            .map_err(|source| EnterError::ReadChildren { path, source })?;
        parse_pid_list(&content).ok_or(EnterError::ParseChildren {
            ppid: pid,
            content,
        })
    }

    /// `/proc/<pid>/exe`.
    #[must_use]
    pub fn exe_path(&self, pid: i32) -> PathBuf {
        self.pid_dir(pid).join("exe")
    }

    /// Resolves the executable link of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be read.
    pub fn exe_target(&self, pid: i32) -> Result<PathBuf> {
        let path = self.exe_path(pid);
        std::fs::read_link(&path).map_err(|source| EnterError::ReadExeLink { path, source })
    }

    /// `/proc/<pid>/root`.
    #[must_use]
    pub fn root_path(&self, leader: LeaderPid) -> PathBuf {
        self.pid_dir(leader.as_raw()).join("root")
    }

    /// `/proc/<pid>/ns/<kind>`.
    #[must_use]
    pub fn namespace_path(&self, leader: LeaderPid, kind: NamespaceKind) -> PathBuf {
        self.pid_dir(leader.as_raw()).join("ns").join(kind.proc_name())
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(constants::PROC_ROOT)
    }
}

fn parse_pid_list(content: &str) -> Option<Vec<i32>> {
    content
        .split_whitespace()
        .map(|token| token.parse::<i32>().ok().filter(|pid| *pid > 0))
        .collect()
}
