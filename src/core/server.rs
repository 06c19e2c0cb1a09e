use crate::utils::error::{Result, TesterError};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};
use tokio::process::{Child, Command};

/// How a run-to-completion attempt ended.
#[derive(Debug)]
pub enum ExitProbe {
    Exited(ExitStatus),
    /// Still running at the deadline; the process has been killed.
    Hung,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Exited,
    Killed,
}

/// Starts instances of the server binary.
#[derive(Debug, Clone)]
pub struct ServerLauncher {
    binary: PathBuf,
    startup_wait: Duration,
}

impl ServerLauncher {
    pub fn new(binary: impl Into<PathBuf>, startup_wait: Duration) -> Self {
        Self {
            binary: binary.into(),
            startup_wait,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Spawns `<binary> <config>` without waiting for it to come up.
    pub fn spawn(&self, config: &Path) -> Result<ServerProcess> {
        tracing::debug!("Spawning {} {}", self.binary.display(), config.display());
        let child = Command::new(&self.binary)
            .arg(config)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TesterError::ServerStartError {
                binary: self.binary.display().to_string(),
                reason: e.to_string(),
            })?;

        ServerProcess::from_child(child, config)
    }

    /// Spawns and gives the server the startup wait; fails if it already exited.
    pub async fn start(&self, config: &Path) -> Result<ServerProcess> {
        let mut server = self.spawn(config)?;
        tokio::time::sleep(self.startup_wait).await;

        if let Some(status) = server.try_exit_status()? {
            return Err(TesterError::ServerStartError {
                binary: self.binary.display().to_string(),
                reason: format!("exited during startup ({})", status),
            });
        }

        tracing::info!("Server started (pid {}) with {}", server.pid(), config.display());
        Ok(server)
    }

    /// Runs the binary expecting it to exit on its own within `timeout`.
    pub async fn run_to_exit(&self, config: &Path, timeout: Duration) -> Result<ExitProbe> {
        let mut server = self.spawn(config)?;
        match tokio::time::timeout(timeout, server.child.wait()).await {
            Ok(status) => Ok(ExitProbe::Exited(status?)),
            Err(_) => {
                tracing::warn!("{} still running after {:?}, killing it", self.binary.display(), timeout);
                server.child.kill().await?;
                Ok(ExitProbe::Hung)
            }
        }
    }
}

/// A running server instance. Killed when dropped.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    pid: u32,
    config: PathBuf,
}

impl ServerProcess {
    pub(crate) fn from_child(child: Child, config: &Path) -> Result<Self> {
        let pid = child.id().ok_or_else(|| TesterError::ProcessError {
            command: config.display().to_string(),
            message: "process exited before its pid could be read".to_string(),
        })?;
        Ok(Self {
            child,
            pid,
            config: config.to_path_buf(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &Path {
        &self.config
    }

    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then SIGKILL once `timeout` passes.
    pub async fn stop(mut self, timeout: Duration) -> Result<StopOutcome> {
        if !self.is_running() {
            return Ok(StopOutcome::Exited);
        }

        if !send_terminate(self.pid) {
            tracing::debug!("SIGTERM not delivered to {}, killing", self.pid);
            self.child.kill().await?;
            return Ok(StopOutcome::Killed);
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                tracing::debug!("Server {} exited with {}", self.pid, status?);
                Ok(StopOutcome::Exited)
            }
            Err(_) => {
                self.child.kill().await?;
                Ok(StopOutcome::Killed)
            }
        }
    }
}

/// Delivers SIGTERM through sysinfo; false when the process is gone.
pub fn send_terminate(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, ProcessRefreshKind::nothing());
    system
        .process(pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // `/bin/sh <script>` stands in for `<binary> <config>`.
    fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        file
    }

    fn launcher(wait_ms: u64) -> ServerLauncher {
        ServerLauncher::new("/bin/sh", Duration::from_millis(wait_ms))
    }

    #[tokio::test]
    async fn test_start_and_stop_long_running_server() {
        let config = script("exec sleep 30");
        let mut server = launcher(200).start(config.path()).await.unwrap();

        assert!(server.is_running());
        assert!(server.pid() > 0);
        assert_eq!(server.config(), config.path());

        let outcome = server.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Exited);
    }

    #[tokio::test]
    async fn test_start_fails_when_server_exits() {
        let config = script("exit 3");
        let err = launcher(300).start(config.path()).await.unwrap_err();
        match err {
            TesterError::ServerStartError { reason, .. } => assert!(reason.contains("exited during startup")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_to_exit_reports_status() {
        let config = script("exit 1");
        match launcher(0).run_to_exit(config.path(), Duration::from_secs(5)).await.unwrap() {
            ExitProbe::Exited(status) => assert_eq!(status.code(), Some(1)),
            ExitProbe::Hung => panic!("script should exit"),
        }
    }

    #[tokio::test]
    async fn test_run_to_exit_detects_hang() {
        let config = script("exec sleep 30");
        let probe = launcher(0)
            .run_to_exit(config.path(), Duration::from_millis(300))
            .await
            .unwrap();
        assert!(matches!(probe, ExitProbe::Hung));
    }

    #[tokio::test]
    async fn test_stop_ignoring_sigterm_escalates_to_kill() {
        let config = script("trap '' TERM\nwhile true; do sleep 1; done");
        let server = launcher(200).start(config.path()).await.unwrap();

        let outcome = server.stop(Duration::from_millis(300)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Killed);
    }

    #[tokio::test]
    async fn test_missing_binary_is_start_error() {
        let err = ServerLauncher::new("/no/such/webserv", Duration::ZERO)
            .spawn(Path::new("config/example.conf"))
            .unwrap_err();
        assert!(matches!(err, TesterError::ServerStartError { .. }));
    }
}
