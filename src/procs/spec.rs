//! # Process specification for supervised execution.
//!
//! Defines [`ProcessSpec`], the declarative descriptor of one managed
//! child: executable path, arguments, privilege to run as, log sink, and
//! the respawn/backoff policies applied by its actor.
//!
//! A spec can be created:
//! - **Explicitly** with [`ProcessSpec::new`] (full control via builders)
//! - **From config** with [`ProcessSpec::with_defaults`] (inherit defaults)
//!
//! ## Rules
//! - A spec is **immutable once queued**: the builder methods consume and
//!   return the spec, and the monitor only ever clones it.
//! - Identity under supervision is the spec's `name` (defaults to the
//!   executable's file name); the registry rejects duplicate names.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::policies::{BackoffPolicy, RespawnPolicy};

/// Privilege a child process runs as.
///
/// Applied at spawn time via `setuid`/`setgid` (never escalates: the
/// supervisor can only drop to these ids, not gain privilege).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunAs {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
}

/// Declarative definition of one managed child process.
///
/// Bundles together:
/// - The executable and its argument list
/// - Optional privilege to drop to ([`RunAs`])
/// - Optional log sink path for stdout/stderr passthrough
/// - Respawn policy ([`RespawnPolicy`]) and backoff ([`BackoffPolicy`])
///
/// ## Example
/// ```rust
/// use procvisor::{Config, ProcessSpec, RespawnPolicy};
///
/// let cfg = Config::default();
/// let spec = ProcessSpec::with_defaults("/usr/bin/apache_exporter", &cfg)
///     .with_args(["--web.listen-address", ":9117"])
///     .with_respawn(RespawnPolicy::Always);
///
/// assert_eq!(spec.name(), "apache_exporter");
/// ```
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    name: Arc<str>,
    executable: PathBuf,
    args: Vec<String>,
    run_as: Option<RunAs>,
    log_path: Option<PathBuf>,
    respawn: RespawnPolicy,
    backoff: BackoffPolicy,
}

impl ProcessSpec {
    /// Creates a new process specification with explicit policies.
    ///
    /// The supervision name defaults to the executable's file name; use
    /// [`with_name`](Self::with_name) when supervising several instances of
    /// the same binary.
    pub fn new(
        executable: impl Into<PathBuf>,
        respawn: RespawnPolicy,
        backoff: BackoffPolicy,
    ) -> Self {
        let executable = executable.into();
        let name: Arc<str> = executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.to_string_lossy().into_owned())
            .into();

        Self {
            name,
            executable,
            args: Vec::new(),
            run_as: None,
            log_path: None,
            respawn,
            backoff,
        }
    }

    /// Creates a process specification inheriting policy defaults from the
    /// global config.
    pub fn with_defaults(executable: impl Into<PathBuf>, cfg: &Config) -> Self {
        Self::new(executable, cfg.respawn, cfg.backoff)
    }

    /// Returns a new spec with an explicit supervision name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns a new spec with the given argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a new spec that drops to the given uid/gid before exec.
    pub fn with_run_as(mut self, uid: u32, gid: u32) -> Self {
        self.run_as = Some(RunAs { uid, gid });
        self
    }

    /// Returns a new spec whose child stdout/stderr are appended to `path`.
    ///
    /// Without a log path, child output is discarded (`/dev/null`). The
    /// engine never interprets log content; formatting and rotation belong
    /// to the embedding application.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Returns a new spec with an updated respawn policy.
    pub fn with_respawn(mut self, respawn: RespawnPolicy) -> Self {
        self.respawn = respawn;
        self
    }

    /// Returns a new spec with an updated backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Stable supervision name (registry identity).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the supervision name.
    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Path of the executable to launch.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Ordered argument list.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Privilege to run as, if configured.
    pub fn run_as(&self) -> Option<RunAs> {
        self.run_as
    }

    /// Log sink path, if configured.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Respawn policy for this child.
    pub fn respawn(&self) -> RespawnPolicy {
        self.respawn
    }

    /// Backoff policy for failure-driven relaunches.
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_file_name() {
        let spec = ProcessSpec::new(
            "/usr/bin/apache_exporter",
            RespawnPolicy::Always,
            BackoffPolicy::default(),
        );
        assert_eq!(spec.name(), "apache_exporter");
        assert_eq!(spec.executable(), Path::new("/usr/bin/apache_exporter"));
    }

    #[test]
    fn builders_compose() {
        let cfg = Config::default();
        let spec = ProcessSpec::with_defaults("/bin/sleep", &cfg)
            .with_name("sleeper-0")
            .with_args(["30"])
            .with_run_as(65534, 65534)
            .with_log_path("/var/log/sleeper.log")
            .with_respawn(RespawnPolicy::Never);

        assert_eq!(spec.name(), "sleeper-0");
        assert_eq!(spec.args(), &["30".to_string()]);
        assert_eq!(spec.run_as(), Some(RunAs { uid: 65534, gid: 65534 }));
        assert_eq!(spec.log_path(), Some(Path::new("/var/log/sleeper.log")));
        assert_eq!(spec.respawn(), RespawnPolicy::Never);
    }
}
