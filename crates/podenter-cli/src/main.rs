//! # enter: run a command inside a running pod
//!
//! Waits for the pod leader, joins its namespaces and root, then execs the
//! in-pod entry helper and exits the way the command did.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;

use clap::Parser;
use podenter_common::constants::BIN_NAME;
use podenter_common::error::{Checkpoint, EXIT_FAILURE, EnterError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::commands::Cli;

fn main() {
    // The workload owns stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let program = program_name();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            std::process::exit(Checkpoint::Usage.exit_code());
        }
    };

    match commands::execute(&cli, &program) {
        Ok(termination) => termination.mirror(),
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{program}: {err:#}");
            }
            std::process::exit(exit_code(&err));
        }
    }
}

/// Name we were invoked as, for diagnostics.
fn program_name() -> String {
    std::env::args_os()
        .next()
        .map_or_else(|| BIN_NAME.to_owned(), |arg| arg.to_string_lossy().into_owned())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<EnterError>()
        .map_or(EXIT_FAILURE, EnterError::exit_code)
}
