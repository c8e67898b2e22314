//! # podenter-core
//!
//! Low-level Linux primitives used to enter a running pod.
//!
//! This crate provides:
//! - **Procfs**: reading process liveness, children lists and `exe` links.
//! - **Namespaces**: the ordered IPC, UTS, network, PID, mount join sequence.
//! - **Filesystem**: the root handle used to re-root into the pod.
//!
//! Kernel effects go through the [`namespace::NamespaceSyscalls`] seam so the
//! join sequence can be exercised without privileges. All unsafe system
//! calls carry `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod namespace;
pub mod procfs;
