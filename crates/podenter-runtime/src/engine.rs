//! Entry pipeline: locate, join, exec and relay.

use std::ffi::OsString;

use podenter_common::config::EnterConfig;
use podenter_common::error::Result;
use podenter_common::types::PodId;
use podenter_core::namespace::{HostSyscalls, enter_namespaces};
use podenter_core::procfs::ProcFs;

use crate::exec::HelperCommand;
use crate::liveness;
use crate::locator::{LeaderLocator, Poller};
use crate::supervisor::{HostJobControl, Supervisor, Termination};

/// Enters pods described by one configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EnterConfig,
}

impl Engine {
    /// Creates an engine for `config`.
    #[must_use]
    pub const fn new(config: EnterConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EnterConfig {
        &self.config
    }

    /// Runs `command` inside `pod` and returns how it terminated.
    ///
    /// The helper argv is built first so a malformed argument fails before
    /// any namespace is joined. After a successful return the calling
    /// process lives inside the pod's namespaces and root; the caller is
    /// expected to [`Termination::mirror`] the result.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. In the forked child this also
    /// returns if exec of the helper fails.
    pub fn enter(&self, pod: &PodId, command: &[OsString]) -> Result<Termination> {
        let helper = HelperCommand::new(&self.config, pod, command)?;
        let proc = ProcFs::new(&self.config.proc_root);

        let liveness = liveness::from_mode(self.config.liveness, &self.config.pod_dir);
        let poller = Poller::new(self.config.poll_interval(), &*liveness);
        let leader = LeaderLocator::new(proc.clone(), self.config.marker_path(), poller).locate()?;

        tracing::info!(pod = %pod, %leader, "entering pod");
        enter_namespaces(&mut HostSyscalls::new(proc), leader)?;

        Supervisor::new(HostJobControl).run(&helper)
    }
}
