//! Command-line definition and dispatch.

pub mod config;

use std::ffi::OsString;

use clap::Parser;
use podenter_common::error::EnterError;
use podenter_common::types::PodId;
use podenter_runtime::engine::Engine;
use podenter_runtime::supervisor::Termination;

/// Run a command inside a running pod.
///
/// Options are only recognised before the pod id. Everything after the pod
/// id is passed to the entry helper untouched.
#[derive(Parser, Debug)]
#[command(name = "enter", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overrides.
    #[command(flatten)]
    pub config: config::ConfigArgs,

    /// Pod id, then the command and its arguments.
    #[arg(
        value_names = ["POD_ID", "CMD"],
        num_args = 2..,
        required = true,
        trailing_var_arg = true
    )]
    pub target: Vec<OsString>,
}

impl Cli {
    /// Splits the positional arguments into the pod id and the command.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::Usage`] if fewer than two positional
    /// arguments were given.
    pub fn target(&self, program: &str) -> Result<(PodId, &[OsString]), EnterError> {
        match self.target.as_slice() {
            [pod, command @ ..] if !command.is_empty() => Ok((PodId::new(pod.clone()), command)),
            _ => Err(EnterError::Usage {
                program: program.to_owned(),
            }),
        }
    }
}

/// Enters the pod named on the command line.
///
/// Returns in the parent once the workload has terminated. In the forked
/// child it only returns if exec of the entry helper failed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or any entry step
/// fails.
pub fn execute(cli: &Cli, program: &str) -> anyhow::Result<Termination> {
    let (pod, command) = cli.target(program)?;
    let config = cli.config.resolve()?;
    tracing::debug!(?config, %pod, "resolved configuration");
    Ok(Engine::new(config).enter(&pod, command)?)
}
