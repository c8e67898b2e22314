//! Pod liveness predicates bounding leader discovery.
//!
//! Discovery polls for as long as the pod is running. There is no other
//! timeout, so a pod stuck mid-startup keeps us polling.

use std::fs::File;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use podenter_common::config::LivenessMode;

/// Answers whether the pod is still running.
pub trait PodLiveness {
    /// Returns `false` once the pod is known to be gone.
    fn is_running(&self) -> bool;
}

impl<F> PodLiveness for F
where
    F: Fn() -> bool,
{
    fn is_running(&self) -> bool {
        self()
    }
}

/// Always reports the pod as running.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeRunning;

impl PodLiveness for AssumeRunning {
    fn is_running(&self) -> bool {
        true
    }
}

/// Reports the pod as running while another process holds the exclusive
/// lock on the pod directory.
///
/// The probe takes a shared lock for the instant between `flock(2)` and
/// close. An orchestrator that tries a non-blocking exclusive lock in that
/// window fails with `EWOULDBLOCK`, so it must retry rather than treat the
/// pod as busy. Shared probes never conflict with each other.
#[derive(Debug, Clone)]
pub struct PodLock {
    dir: PathBuf,
}

impl PodLock {
    /// Watches the lock on `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PodLiveness for PodLock {
    fn is_running(&self) -> bool {
        let dir = match File::open(&self.dir) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(path = %self.dir.display(), error = %e, "cannot open pod directory, assuming running");
                return true;
            }
        };
        match Flock::lock(dir, FlockArg::LockSharedNonblock) {
            // No exclusive holder; dropping ours releases it.
            Ok(_lock) => false,
            Err((_, Errno::EWOULDBLOCK)) => true,
            Err((_, errno)) => {
                tracing::warn!(path = %self.dir.display(), %errno, "cannot probe pod lock, assuming running");
                true
            }
        }
    }
}

/// Builds the predicate selected by the configuration.
#[must_use]
pub fn from_mode(mode: LivenessMode, pod_dir: &Path) -> Box<dyn PodLiveness> {
    match mode {
        LivenessMode::AssumeRunning => Box::new(AssumeRunning),
        LivenessMode::PodLock => Box::new(PodLock::new(pod_dir)),
    }
}
