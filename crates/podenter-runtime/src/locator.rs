//! Discovery of the pod leader under a racing pod startup.
//!
//! The pod supervisor writes its pid into the `ppid` marker, then forks
//! the leader, which re-execs itself before it is safe to enter. Each of
//! these facts may not exist yet when we look, so every step polls until
//! it appears or the pod is reported as no longer running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use podenter_common::error::{EnterError, Result};
use podenter_common::types::LeaderPid;
use podenter_core::procfs::ProcFs;

use crate::liveness::PodLiveness;

/// Fixed-interval poll bounded by a liveness predicate.
pub struct Poller<'a> {
    interval: Duration,
    liveness: &'a dyn PodLiveness,
}

impl<'a> Poller<'a> {
    /// Polls every `interval` while `liveness` holds.
    #[must_use]
    pub fn new(interval: Duration, liveness: &'a dyn PodLiveness) -> Self {
        Self { interval, liveness }
    }

    /// Sleeps one interval, unless the pod is no longer running.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::PodNotRunning`] when the predicate fails.
    pub fn wait(&self, waiting_for: &'static str) -> Result<()> {
        if !self.liveness.is_running() {
            return Err(EnterError::PodNotRunning { waiting_for });
        }
        tracing::trace!(waiting_for, interval = ?self.interval, "not ready yet, polling");
        std::thread::sleep(self.interval);
        Ok(())
    }
}

/// Reads the `ppid` marker.
///
/// The marker is read the way `scanf("%i")` reads it: leading whitespace
/// is skipped, an optional sign and a `0x` or `0` prefix select the base,
/// and parsing stops at the first character that is not a digit. Returns
/// `Ok(None)` while the marker does not exist or still holds zero.
///
/// # Errors
///
/// Returns an error if the marker cannot be read or does not start with a
/// non-negative integer that fits a pid.
pub fn read_marker(path: &Path) -> Result<Option<i32>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(EnterError::ReadMarker {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match scan_integer(&content).and_then(|value| i32::try_from(value).ok()) {
        Some(0) => Ok(None),
        Some(pid) if pid > 0 => Ok(Some(pid)),
        _ => Err(EnterError::ParseMarker {
            path: path.to_path_buf(),
            content,
        }),
    }
}

/// Leading integer of `input` with C base detection.
fn scan_integer(input: &str) -> Option<i64> {
    let input = input.trim_start();
    let (negative, unsigned) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let hex = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_hexdigit()));
    let (radix, digits) = match hex {
        Some(rest) => (16, rest),
        None if unsigned.starts_with('0') => (8, unsigned),
        None => (10, unsigned),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Finds the pid of the pod's namespace-owning leader.
pub struct LeaderLocator<'a> {
    proc: ProcFs,
    marker: PathBuf,
    poller: Poller<'a>,
}

impl<'a> LeaderLocator<'a> {
    /// Creates a locator reading `marker` and resolving pids through `proc`.
    #[must_use]
    pub fn new(proc: ProcFs, marker: impl Into<PathBuf>, poller: Poller<'a>) -> Self {
        Self {
            proc,
            marker: marker.into(),
            poller,
        }
    }

    /// Polls until the leader exists and has finished its own setup.
    ///
    /// The returned pid is only known to be valid at the moment of return.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod stops running while polling, the marker
    /// is corrupt, the supervisor is gone, the kernel cannot enumerate
    /// children, or the supervisor has more than one child.
    pub fn locate(&self) -> Result<LeaderPid> {
        let ppid = self.wait_for_supervisor()?;
        self.proc.require_child_enumeration()?;
        let pid = self.wait_for_child(ppid)?;
        self.wait_until_ready(ppid, pid)?;
        tracing::info!(ppid, pid, "located pod leader");
        Ok(LeaderPid::from_raw(pid))
    }

    fn wait_for_supervisor(&self) -> Result<i32> {
        loop {
            if let Some(ppid) = read_marker(&self.marker)? {
                if !self.proc.is_alive(ppid) {
                    return Err(EnterError::SupervisorGone { ppid });
                }
                tracing::debug!(ppid, "read pod supervisor pid");
                return Ok(ppid);
            }
            self.poller.wait("the ppid marker")?;
        }
    }

    fn wait_for_child(&self, ppid: i32) -> Result<i32> {
        loop {
            match self.proc.children(ppid)?.as_slice() {
                [] => self.poller.wait("the pod leader to be forked")?,
                [pid] => return Ok(*pid),
                children => {
                    // TODO: decide whether pods that fork several early
                    // children should pick one instead of failing.
                    return Err(EnterError::MultipleChildren {
                        ppid,
                        children: children.to_vec(),
                    });
                }
            }
        }
    }

    /// The leader re-execs itself after chrooting; until then its `exe`
    /// is still the supervisor's and its root is the wrong directory.
    fn wait_until_ready(&self, ppid: i32, pid: i32) -> Result<()> {
        loop {
            let supervisor_exe = self.proc.exe_target(ppid)?;
            let leader_exe = self.proc.exe_target(pid)?;
            if supervisor_exe != leader_exe {
                return Ok(());
            }
            tracing::debug!(ppid, pid, exe = %leader_exe.display(), "leader has not re-executed yet");
            self.poller.wait("the pod leader to finish its setup")?;
        }
    }
}
