//! System-wide constants and default paths.

/// Entry helper executed inside the pod once namespaces are joined.
pub const DEFAULT_HELPER: &str = "/diagexec";

/// Directory holding per-app stage2 trees, as seen from inside the pod.
pub const DEFAULT_STAGE2_DIR: &str = "/opt/stage2";

/// Directory holding per-app environment files, as seen from inside the pod.
pub const DEFAULT_ENV_DIR: &str = "/rkt/env";

/// Working directory handed to the entry helper.
pub const DEFAULT_WORKDIR: &str = "/";

/// User id handed to the entry helper.
pub const DEFAULT_UID: &str = "0";

/// Group id handed to the entry helper.
pub const DEFAULT_GID: &str = "0";

/// Directory containing the leader marker. The orchestrator starts us in
/// the pod root, so the default is the current directory.
pub const DEFAULT_POD_DIR: &str = ".";

/// Name of the advisory marker file holding the pid of the pod's
/// supervising process.
pub const PPID_MARKER: &str = "ppid";

/// Procfs mount point.
pub const PROC_ROOT: &str = "/proc";

/// Entry probed under the proc root to detect `CONFIG_CHECKPOINT_RESTORE`.
pub const CHILD_ENUMERATION_PROBE: &str = "1/task/1/children";

/// Delay between two discovery attempts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "PODENTER_CONFIG";

/// Binary name.
pub const BIN_NAME: &str = "enter";
