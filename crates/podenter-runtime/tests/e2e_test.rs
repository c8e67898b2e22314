//! End-to-end tests for the podenter runtime.
//!
//! These drive the public pipeline pieces against a fake procfs tree and
//! real child processes:
//! 1. Leader discovery racing a pod that starts up while we poll
//! 2. Helper argv for a located pod
//! 3. Job-control relay of real exit statuses and signals
//! 4. Mirroring a workload's end onto a real process

#![allow(unsafe_code, clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::cell::Cell;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use podenter_common::config::EnterConfig;
use podenter_common::error::Checkpoint;
use podenter_common::types::{LeaderPid, NamespaceKind, PodId};
use podenter_core::procfs::ProcFs;
use podenter_runtime::exec::HelperCommand;
use podenter_runtime::locator::{LeaderLocator, Poller};
use podenter_runtime::supervisor::{HostJobControl, Termination, relay};

// ── Discovery ────────────────────────────────────────────────────────

fn spawn_fake(proc: &ProcFs, pid: i32, exe: &str) {
    fs::create_dir_all(proc.pid_dir(pid)).expect("mkdir pid");
    let link = proc.exe_path(pid);
    let _ = fs::remove_file(&link);
    symlink(exe, link).expect("symlink exe");
}

fn write_children(proc: &ProcFs, pid: i32, content: &str) {
    let path = proc.children_path(pid);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir task");
    fs::write(path, content).expect("write children");
}

#[test]
fn pipeline_discovery_follows_pod_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = EnterConfig {
        pod_dir: dir.path().join("pod"),
        proc_root: dir.path().join("proc"),
        ..EnterConfig::default()
    };
    fs::create_dir_all(&config.pod_dir).expect("mkdir pod");
    let proc = ProcFs::new(&config.proc_root);
    write_children(&proc, 1, "");

    // Each poll advances the fake pod by one startup step.
    let step = Cell::new(0);
    let liveness = || {
        step.set(step.get() + 1);
        match step.get() {
            1 => {
                spawn_fake(&proc, 300, "/usr/bin/systemd-nspawn");
                write_children(&proc, 300, "");
                fs::write(config.marker_path(), "300\n").expect("marker");
            }
            2 => {
                spawn_fake(&proc, 301, "/usr/bin/systemd-nspawn");
                write_children(&proc, 300, "301 ");
            }
            3 => spawn_fake(&proc, 301, "/usr/lib/systemd/systemd"),
            _ => {}
        }
        true
    };

    let poller = Poller::new(Duration::from_millis(1), &liveness);
    let leader = LeaderLocator::new(proc.clone(), config.marker_path(), poller)
        .locate()
        .expect("locate");
    assert_eq!(leader, LeaderPid::from_raw(301));
    assert_eq!(step.get(), 3);
    assert_eq!(
        proc.namespace_path(leader, NamespaceKind::Mnt),
        Path::new(&config.proc_root).join("301/ns/mnt")
    );
}

#[test]
fn pipeline_discovery_gives_up_with_the_pod() {
    let dir = tempfile::tempdir().expect("tempdir");
    let proc = ProcFs::new(dir.path().join("proc"));
    write_children(&proc, 1, "");
    spawn_fake(&proc, 300, "/usr/bin/systemd-nspawn");
    write_children(&proc, 300, "");
    let marker = dir.path().join("ppid");
    fs::write(&marker, "300").expect("marker");

    let polls = Cell::new(0);
    let liveness = || {
        polls.set(polls.get() + 1);
        polls.get() < 3
    };
    let poller = Poller::new(Duration::from_millis(1), &liveness);
    let err = LeaderLocator::new(proc, marker, poller).locate().unwrap_err();
    assert_eq!(err.checkpoint(), Checkpoint::PodTerminated);
    assert_eq!(err.exit_code(), 6);
}

// ── Helper argv ──────────────────────────────────────────────────────

#[test]
fn pipeline_helper_argv_for_pod() {
    let command =
        HelperCommand::new(&EnterConfig::default(), &PodId::new("4e2c"), &["/bin/sh", "-l"])
            .expect("argv");
    let argv: Vec<_> = command
        .argv()
        .iter()
        .map(|arg| arg.to_str().expect("utf-8"))
        .collect();
    assert_eq!(
        argv,
        [
            "/diagexec",
            "/opt/stage2/4e2c/rootfs",
            "/",
            "/rkt/env/4e2c",
            "0",
            "0",
            "/bin/sh",
            "-l"
        ]
    );
}

// ── Relay ────────────────────────────────────────────────────────────

fn relay_shell(script: &str) -> Termination {
    let child = Command::new("/bin/sh")
        .args(["-c", script])
        .spawn()
        .expect("spawn sh");
    let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid fits i32"));
    relay(&mut HostJobControl, pid).expect("relay")
}

#[test]
fn pipeline_relay_mirrors_exit_status() {
    assert_eq!(relay_shell("exit 7"), Termination::Exited(7));
    assert_eq!(relay_shell("true"), Termination::Exited(0));
}

#[test]
fn pipeline_relay_mirrors_fatal_signal() {
    assert_eq!(
        relay_shell("kill -KILL $$"),
        Termination::Signaled(Signal::SIGKILL)
    );
}

// ── Mirroring ────────────────────────────────────────────────────────

/// Forks, lets the child prepare its signal state, then mirrors
/// `termination` in the child and returns how it ended.
fn mirror_in_child(termination: Termination, prepare: fn()) -> WaitStatus {
    // SAFETY: the child only touches its own signal state and terminates
    // without returning into the test harness.
    match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            prepare();
            termination.mirror()
        }
        ForkResult::Parent { child } => waitpid(child, None).expect("waitpid"),
    }
}

fn leave_signals_alone() {}

#[test]
fn pipeline_mirror_exits_with_workload_code() {
    match mirror_in_child(Termination::Exited(7), leave_signals_alone) {
        WaitStatus::Exited(_, code) => assert_eq!(code, 7),
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn pipeline_mirror_dies_by_workload_signal() {
    match mirror_in_child(Termination::Signaled(Signal::SIGKILL), leave_signals_alone) {
        WaitStatus::Signaled(_, signal, _) => assert_eq!(signal, Signal::SIGKILL),
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn pipeline_mirror_overrides_ignored_signal() {
    fn ignore_sigterm() {
        // SAFETY: ignoring a signal installs no handler code.
        let _previous =
            unsafe { signal::signal(Signal::SIGTERM, SigHandler::SigIgn) }.expect("ignore SIGTERM");
    }
    match mirror_in_child(Termination::Signaled(Signal::SIGTERM), ignore_sigterm) {
        WaitStatus::Signaled(_, signal, _) => assert_eq!(signal, Signal::SIGTERM),
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn pipeline_mirror_unblocks_blocked_signal() {
    fn block_sigint() {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.thread_block().expect("block SIGINT");
    }
    match mirror_in_child(Termination::Signaled(Signal::SIGINT), block_sigint) {
        WaitStatus::Signaled(_, signal, _) => assert_eq!(signal, Signal::SIGINT),
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn pipeline_mirror_unknown_outcome_is_generic_failure() {
    match mirror_in_child(Termination::Unknown, leave_signals_alone) {
        WaitStatus::Exited(_, code) => assert_eq!(code, 1),
        other => panic!("unexpected status: {other:?}"),
    }
}
