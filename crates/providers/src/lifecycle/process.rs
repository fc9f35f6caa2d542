//! Supervision of the local inference server process.

use localecho_config::ServerCommand;
use localecho_core::error::LifecycleError;
use std::path::Path;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A child process started from an absolute program path.
///
/// The program is never resolved through `PATH`, so a supervisor with a
/// minimal environment starts the same binary as an interactive shell.
pub struct ServerProcess {
    command: ServerCommand,
    child: Mutex<Option<Child>>,
}

impl ServerProcess {
    pub fn new(command: ServerCommand) -> Result<Self, LifecycleError> {
        if !Path::new(&command.program).is_absolute() {
            return Err(LifecycleError::Process(format!(
                "server program '{}' must be an absolute path",
                command.program
            )));
        }
        Ok(Self {
            command,
            child: Mutex::new(None),
        })
    }

    /// Spawn the server unless it is already running. Returns its pid.
    pub async fn start(&self) -> Result<Option<u32>, LifecycleError> {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(child.id()),
                Ok(Some(status)) => warn!(%status, "Server process had exited"),
                Err(e) => warn!(error = %e, "Could not poll server process"),
            }
        }

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args).kill_on_drop(true);
        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            LifecycleError::Process(format!("failed to spawn {}: {e}", self.command.program))
        })?;
        let pid = child.id();
        info!(program = %self.command.program, pid, "Started inference server");
        *guard = Some(child);
        Ok(pid)
    }

    /// Kill the server if it is running.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        child
            .kill()
            .await
            .map_err(|e| LifecycleError::Process(format!("failed to stop server: {e}")))?;
        info!("Stopped inference server");
        Ok(())
    }

    /// The pid of the running server, if any.
    pub async fn pid(&self) -> Option<u32> {
        let mut guard = self.child.lock().await;
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(None) => child.id(),
            _ => None,
        }
    }
}

/// Resident set size of `pid` in megabytes, read from procfs.
pub fn resident_memory_mb(pid: u32) -> Option<f64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb as f64 / 1024.0)
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(program: &str, args: &[&str]) -> ServerCommand {
        ServerCommand {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
        }
    }

    #[test]
    fn relative_program_is_rejected() {
        assert!(matches!(
            ServerProcess::new(command("python3", &[])),
            Err(LifecycleError::Process(_))
        ));
    }

    #[test]
    fn vm_rss_parsing() {
        let status = "Name:\tmlx\nVmPeak:\t 9000 kB\nVmRSS:\t  204800 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_kb(status), Some(204800));
        assert_eq!(parse_vm_rss_kb("Name:\tx\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_memory_is_readable() {
        let mb = resident_memory_mb(std::process::id()).unwrap();
        assert!(mb > 0.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_and_stop_child() {
        let process = ServerProcess::new(command("/bin/sleep", &["30"])).unwrap();
        let pid = process.start().await.unwrap();
        assert!(pid.is_some());
        // A second start reuses the running child.
        assert_eq!(process.start().await.unwrap(), pid);
        assert_eq!(process.pid().await, pid);

        process.stop().await.unwrap();
        assert_eq!(process.pid().await, None);
        process.stop().await.unwrap();
    }
}
