//! Configuration layering: defaults, optional JSON file, then flags.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use podenter_common::config::{EnterConfig, LivenessMode};
use podenter_common::constants::CONFIG_ENV;

/// Configuration flags. Each one falls back to a `PODENTER_*` variable.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON configuration file.
    #[arg(long, env = CONFIG_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Entry helper executed inside the pod.
    #[arg(long, env = "PODENTER_HELPER", value_name = "PATH")]
    pub helper: Option<PathBuf>,

    /// Directory holding per-app stage2 trees.
    #[arg(long, env = "PODENTER_STAGE2_DIR", value_name = "DIR")]
    pub stage2_dir: Option<PathBuf>,

    /// Directory holding per-app environment files.
    #[arg(long, env = "PODENTER_ENV_DIR", value_name = "DIR")]
    pub env_dir: Option<PathBuf>,

    /// Working directory handed to the helper.
    #[arg(long, env = "PODENTER_WORKDIR", value_name = "DIR")]
    pub workdir: Option<String>,

    /// User id handed to the helper.
    #[arg(long, env = "PODENTER_UID")]
    pub uid: Option<String>,

    /// Group id handed to the helper.
    #[arg(long, env = "PODENTER_GID")]
    pub gid: Option<String>,

    /// Directory containing the `ppid` marker.
    #[arg(long, env = "PODENTER_POD_DIR", value_name = "DIR")]
    pub pod_dir: Option<PathBuf>,

    /// Procfs mount point.
    #[arg(long, env = "PODENTER_PROC_ROOT", value_name = "DIR")]
    pub proc_root: Option<PathBuf>,

    /// Delay between discovery attempts, in milliseconds.
    #[arg(long, env = "PODENTER_POLL_INTERVAL_MS", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// How to tell whether the pod is still running: assume-running or
    /// pod-lock.
    #[arg(long, env = "PODENTER_LIVENESS", value_name = "MODE")]
    pub liveness: Option<LivenessMode>,
}

impl ConfigArgs {
    /// Builds the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// result fails validation.
    pub fn resolve(&self) -> anyhow::Result<EnterConfig> {
        let mut config = match &self.config {
            Some(path) => EnterConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => EnterConfig::default(),
        };
        override_with(&mut config.helper, self.helper.as_ref());
        override_with(&mut config.stage2_dir, self.stage2_dir.as_ref());
        override_with(&mut config.env_dir, self.env_dir.as_ref());
        override_with(&mut config.workdir, self.workdir.as_ref());
        override_with(&mut config.uid, self.uid.as_ref());
        override_with(&mut config.gid, self.gid.as_ref());
        override_with(&mut config.pod_dir, self.pod_dir.as_ref());
        override_with(&mut config.proc_root, self.proc_root.as_ref());
        override_with(&mut config.poll_interval_ms, self.poll_interval_ms.as_ref());
        override_with(&mut config.liveness, self.liveness.as_ref());
        config.validate()?;
        Ok(config)
    }
}

fn override_with<T: Clone>(slot: &mut T, flag: Option<&T>) {
    if let Some(value) = flag {
        slot.clone_from(value);
    }
}
