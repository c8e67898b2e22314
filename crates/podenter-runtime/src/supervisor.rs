//! Fork of the entry helper and job-control relay.
//!
//! Joining a PID namespace only applies to processes created afterwards,
//! so the helper runs in a forked child. The parent stays behind and
//! mirrors the child's job-control state on itself, nsenter-style: when
//! the child stops we stop, and when our controller continues us we
//! continue the child. Once the child terminates, [`Termination::mirror`]
//! makes this process end the same way.

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, getpid};
use podenter_common::error::{EXIT_FAILURE, EnterError, Result};

use crate::exec::HelperCommand;

/// What a single `waitpid(2)` reported about the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The child exited with a status code.
    Exited(i32),
    /// The child was killed by a signal.
    Signaled(Signal),
    /// The child was suspended by a signal.
    Stopped(Signal),
}

impl ExitOutcome {
    /// Classifies a wait status. Returns `None` for statuses that cannot
    /// be reported under `WUNTRACED`.
    #[must_use]
    pub const fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Self::Signaled(signal)),
            WaitStatus::Stopped(_, signal) => Some(Self::Stopped(signal)),
            _ => None,
        }
    }
}

/// How the child finished, as seen by the relay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited with this status.
    Exited(i32),
    /// Killed by this signal.
    Signaled(Signal),
    /// Anything else.
    Unknown,
}

impl Termination {
    /// Ends this process the way the child ended.
    ///
    /// Exits with the child's status, or raises the child's terminating
    /// signal on ourselves. Falls back to [`EXIT_FAILURE`] when the signal
    /// does not kill us or the outcome is unknown.
    pub fn mirror(self) -> ! {
        match self {
            Self::Exited(code) => std::process::exit(code),
            Self::Signaled(signal) => {
                reraise(signal);
                std::process::exit(EXIT_FAILURE)
            }
            Self::Unknown => std::process::exit(EXIT_FAILURE),
        }
    }
}

/// `SIGKILL` and `SIGSTOP` always have their default action; the kernel
/// refuses to change it.
const fn has_settable_disposition(signal: Signal) -> bool {
    !matches!(signal, Signal::SIGKILL | Signal::SIGSTOP)
}

fn reraise(signal: Signal) {
    if has_settable_disposition(signal) {
        // SAFETY: installing the default disposition does not run any code
        // in signal context.
        if let Err(errno) = unsafe { signal::signal(signal, SigHandler::SigDfl) } {
            tracing::warn!(%signal, %errno, "cannot reset signal disposition");
        }
    }
    let mut mask = SigSet::empty();
    mask.add(signal);
    if let Err(errno) = mask.thread_unblock() {
        tracing::warn!(%signal, %errno, "cannot unblock signal");
    }
    tracing::debug!(%signal, "re-raising workload signal");
    if let Err(errno) = signal::raise(signal) {
        tracing::warn!(%signal, %errno, "cannot raise signal");
    }
}

/// Process-level operations used by the relay loop.
pub trait JobControl {
    /// Blocks until the child changes state, including being stopped.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::Wait`] if `waitpid(2)` fails.
    fn wait(&mut self, child: Pid) -> Result<WaitStatus>;

    /// Stops this process; returns once it has been continued.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::Relay`] if the stop signal cannot be sent.
    fn suspend_self(&mut self) -> Result<()>;

    /// Continues the child.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::Relay`] if the continue signal cannot be sent.
    fn resume(&mut self, child: Pid) -> Result<()>;
}

/// Job control against the real process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostJobControl;

impl JobControl for HostJobControl {
    fn wait(&mut self, child: Pid) -> Result<WaitStatus> {
        loop {
            match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
                Err(Errno::EINTR) => {}
                Err(source) => {
                    return Err(EnterError::Wait {
                        pid: child.as_raw(),
                        source,
                    });
                }
                Ok(status) => return Ok(status),
            }
        }
    }

    fn suspend_self(&mut self) -> Result<()> {
        signal::kill(getpid(), Signal::SIGSTOP).map_err(|source| EnterError::Relay {
            action: "stop ourselves",
            source,
        })
    }

    fn resume(&mut self, child: Pid) -> Result<()> {
        signal::kill(child, Signal::SIGCONT).map_err(|source| EnterError::Relay {
            action: "continue the workload",
            source,
        })
    }
}

/// State of the relayed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    Running,
    Suspended,
}

/// Waits for `child`, relaying every stop to ourselves and every resume
/// back to the child, until the child terminates.
///
/// # Errors
///
/// Returns an error if waiting or signalling fails. Wait failures are not
/// retried.
pub fn relay<J: JobControl>(job_control: &mut J, child: Pid) -> Result<Termination> {
    let mut state = RelayState::Running;
    loop {
        state = match state {
            RelayState::Running => {
                let status = job_control.wait(child)?;
                match ExitOutcome::from_wait_status(status) {
                    Some(ExitOutcome::Stopped(signal)) => {
                        tracing::debug!(%child, %signal, "workload stopped, suspending");
                        RelayState::Suspended
                    }
                    Some(ExitOutcome::Exited(code)) => {
                        tracing::debug!(%child, code, "workload exited");
                        return Ok(Termination::Exited(code));
                    }
                    Some(ExitOutcome::Signaled(signal)) => {
                        tracing::debug!(%child, %signal, "workload killed");
                        return Ok(Termination::Signaled(signal));
                    }
                    None => {
                        tracing::warn!(%child, ?status, "unexpected wait status");
                        return Ok(Termination::Unknown);
                    }
                }
            }
            RelayState::Suspended => {
                job_control.suspend_self()?;
                job_control.resume(child)?;
                tracing::debug!(%child, "resumed, workload continued");
                RelayState::Running
            }
        };
    }
}

/// Forks the entry helper and relays its job control.
#[derive(Debug, Default)]
pub struct Supervisor<J> {
    job_control: J,
}

impl<J: JobControl> Supervisor<J> {
    /// Creates a supervisor using `job_control`.
    #[must_use]
    pub const fn new(job_control: J) -> Self {
        Self { job_control }
    }

    /// Forks and execs `command` in the child; relays in the parent.
    ///
    /// In the child this only returns if `execv(2)` failed.
    ///
    /// # Errors
    ///
    /// Returns an error if forking fails, if exec fails (child only), or
    /// if the relay fails (parent only).
    pub fn run(&mut self, command: &HelperCommand) -> Result<Termination> {
        // SAFETY: the process is single-threaded here, and the child only
        // calls `execv` or reports its failure.
        match unsafe { fork() }.map_err(|source| EnterError::Fork { source })? {
            ForkResult::Child => match command.exec() {
                Ok(never) => match never {},
                Err(err) => Err(err),
            },
            ForkResult::Parent { child } => {
                tracing::info!(%child, helper = %command.helper().display(), "forked entry helper");
                relay(&mut self.job_control, child)
            }
        }
    }
}
