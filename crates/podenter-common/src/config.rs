//! Configuration model for entering a pod.
//!
//! Every field has a default matching the stage1 layout, so an empty
//! configuration is a valid one. The binary layers an optional JSON file
//! and command-line overrides on top.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{EnterError, Result};
use crate::types::PodId;

/// How discovery decides whether the pod is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LivenessMode {
    /// Never give up while polling.
    #[default]
    AssumeRunning,
    /// The pod runs while someone holds the lock on the pod directory.
    PodLock,
}

impl FromStr for LivenessMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "assume-running" => Ok(Self::AssumeRunning),
            "pod-lock" => Ok(Self::PodLock),
            other => Err(format!(
                "unknown liveness mode {other:?} (expected assume-running or pod-lock)"
            )),
        }
    }
}

impl fmt::Display for LivenessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssumeRunning => write!(f, "assume-running"),
            Self::PodLock => write!(f, "pod-lock"),
        }
    }
}

/// Root configuration for one `enter` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnterConfig {
    /// Entry helper executed inside the pod.
    pub helper: PathBuf,
    /// Parent of the per-app stage2 trees inside the pod.
    pub stage2_dir: PathBuf,
    /// Directory of per-app environment files inside the pod.
    pub env_dir: PathBuf,
    /// Working directory handed to the helper.
    pub workdir: String,
    /// User id handed to the helper.
    pub uid: String,
    /// Group id handed to the helper.
    pub gid: String,
    /// Directory holding the `ppid` marker.
    pub pod_dir: PathBuf,
    /// Procfs mount point.
    pub proc_root: PathBuf,
    /// Delay between discovery attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Liveness predicate bounding discovery.
    pub liveness: LivenessMode,
}

impl Default for EnterConfig {
    fn default() -> Self {
        Self {
            helper: PathBuf::from(constants::DEFAULT_HELPER),
            stage2_dir: PathBuf::from(constants::DEFAULT_STAGE2_DIR),
            env_dir: PathBuf::from(constants::DEFAULT_ENV_DIR),
            workdir: constants::DEFAULT_WORKDIR.to_owned(),
            uid: constants::DEFAULT_UID.to_owned(),
            gid: constants::DEFAULT_GID.to_owned(),
            pod_dir: PathBuf::from(constants::DEFAULT_POD_DIR),
            proc_root: PathBuf::from(constants::PROC_ROOT),
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            liveness: LivenessMode::default(),
        }
    }
}

impl EnterConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON, has unknown
    /// fields, or fails [`Self::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EnterError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json(&content)
    }

    /// Checks values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero poll interval or a relative helper path.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(EnterError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if !self.helper.is_absolute() {
            return Err(EnterError::Config {
                message: format!("helper must be an absolute path: {}", self.helper.display()),
            });
        }
        Ok(())
    }

    /// Delay between discovery attempts.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Root filesystem of the pod's app, e.g. `/opt/stage2/<id>/rootfs`.
    #[must_use]
    pub fn rootfs_path(&self, pod: &PodId) -> PathBuf {
        self.stage2_dir.join(pod.as_os_str()).join("rootfs")
    }

    /// Environment file of the pod's app, e.g. `/rkt/env/<id>`.
    #[must_use]
    pub fn env_path(&self, pod: &PodId) -> PathBuf {
        self.env_dir.join(pod.as_os_str())
    }

    /// Path of the leader marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.pod_dir.join(constants::PPID_MARKER)
    }
}
