//! Argument vector handed to the in-pod entry helper.
//!
//! The helper's positional contract is fixed:
//!
//! ```text
//! <helper> <rootfs> <workdir> <env-file> <uid> <gid> <cmd> [args...]
//! ```
//!
//! Everything after the pod id on our own command line is forwarded
//! verbatim after the fixed prefix.

use std::convert::Infallible;
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use podenter_common::config::EnterConfig;
use podenter_common::error::{EnterError, Result};
use podenter_common::types::PodId;

/// Fully built `execv(2)` call for the entry helper.
///
/// Built before any namespace is joined so the forked child only has to
/// call `execv`.
#[derive(Debug, Clone)]
pub struct HelperCommand {
    helper: PathBuf,
    argv: Vec<CString>,
}

impl HelperCommand {
    /// Builds the helper invocation for `pod`, forwarding `forwarded`.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::BuildArgv`] if any argument contains a NUL byte.
    pub fn new<S: AsRef<OsStr>>(config: &EnterConfig, pod: &PodId, forwarded: &[S]) -> Result<Self> {
        let rootfs = config.rootfs_path(pod);
        let env_file = config.env_path(pod);
        let fixed: [&OsStr; 6] = [
            config.helper.as_os_str(),
            rootfs.as_os_str(),
            OsStr::new(&config.workdir),
            env_file.as_os_str(),
            OsStr::new(&config.uid),
            OsStr::new(&config.gid),
        ];
        let argv = fixed
            .into_iter()
            .chain(forwarded.iter().map(|arg| arg.as_ref()))
            .map(to_cstring)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            helper: config.helper.clone(),
            argv,
        })
    }

    /// The helper executable.
    #[must_use]
    pub fn helper(&self) -> &std::path::Path {
        &self.helper
    }

    /// The argument vector, starting with the helper path.
    #[must_use]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Replaces the current process image with the helper.
    ///
    /// Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns [`EnterError::Exec`] if `execv(2)` fails.
    pub fn exec(&self) -> Result<Infallible> {
        let path: &CStr = &self.argv[0];
        nix::unistd::execv(path, &self.argv).map_err(|source| EnterError::Exec {
            helper: self.helper.clone(),
            source,
        })
    }
}

fn to_cstring(arg: &OsStr) -> Result<CString> {
    CString::new(arg.as_bytes()).map_err(|_| EnterError::BuildArgv {
        arg: arg.to_string_lossy().into_owned(),
    })
}
