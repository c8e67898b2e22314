//! # podenter-common
//!
//! Shared types, error definitions, configuration model and constants
//! used across the podenter workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate. Every fatal condition in the workspace is an
//! [`error::EnterError`], and every error maps to one
//! [`error::Checkpoint`], which is what the `enter` binary reports as its
//! exit code.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
