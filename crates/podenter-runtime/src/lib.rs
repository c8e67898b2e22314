//! Pod entry orchestration for podenter.
//!
//! [`engine::Engine`] runs the three stages in order: [`locator`] finds
//! the pod leader, `podenter_core` joins its namespaces, and
//! [`supervisor`] forks the entry helper and mirrors its job-control
//! state.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod exec;
pub mod liveness;
pub mod locator;
pub mod supervisor;
