//! Filesystem handles used to re-root into a pod.

pub mod root;

pub use root::RootHandle;
