//! Test command - spawn worker processes that perform redirected writes.
//!
//! Each worker is a child process running the hidden `worker` subcommand of
//! this binary. Workers share nothing but the working directory; each writes
//! its own `logs/logs_<pid>/` directory.

use anyhow::{Context, Result};
use pageshadow_core::ShadowConfig;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::task::JoinSet;

/// Global flags passed on to each worker.
#[derive(Debug, Clone, Default)]
pub struct Forward {
    pub verbose: u8,
    pub config: Option<PathBuf>,
}

/// Run the test command.
pub async fn run(config: &ShadowConfig, forward: &Forward) -> Result<()> {
    config.validate()?;

    let files_dir = config.workspace().files_dir();
    if !files_dir.is_dir() {
        anyhow::bail!(
            "{} does not exist, run `pageshadow init` first",
            files_dir.display()
        );
    }

    let exe = std::env::current_exe().context("Failed to locate the pageshadow executable")?;
    let children = spawn_workers(&exe, config, forward).await?;
    tracing::info!(workers = children.len(), "Started workers");

    let mut workers: JoinSet<(usize, Option<u32>, std::io::Result<ExitStatus>)> = JoinSet::new();
    for (index, mut child) in children {
        let pid = child.id();
        workers.spawn(async move { (index, pid, child.wait().await) });
    }

    let mut failed = 0;
    while let Some(joined) = workers.join_next().await {
        let (index, pid, status) = joined.context("Worker wait task failed")?;
        match status {
            Ok(status) if status.success() => {
                tracing::info!(worker = index, pid, "Worker finished");
            }
            Ok(status) => {
                failed += 1;
                tracing::error!(worker = index, pid, status = %status, "Worker failed");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(worker = index, pid, error = %e, "Failed to wait for worker");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} workers failed", failed, config.processes);
    }

    println!(
        "{} workers wrote {:?} at offset {} to {} files",
        config.processes,
        config.write_payload,
        config.write_offset,
        config.files
    );
    println!("Logs: {}", config.workspace().logs_dir().display());
    Ok(())
}

/// Start every worker. If one cannot be started, the ones already running are
/// killed and reaped.
async fn spawn_workers(
    exe: &Path,
    config: &ShadowConfig,
    forward: &Forward,
) -> Result<Vec<(usize, Child)>> {
    let mut children = Vec::with_capacity(config.processes);
    for index in 0..config.processes {
        match worker_command(exe, config, forward, index).spawn() {
            Ok(child) => {
                tracing::debug!(worker = index, pid = child.id(), "Spawned worker");
                children.push((index, child));
            }
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Failed to spawn worker");
                for (started, mut child) in children {
                    if let Err(kill_error) = child.kill().await {
                        tracing::warn!(worker = started, error = %kill_error, "Failed to kill worker");
                    }
                }
                return Err(e).context(format!("Failed to spawn worker {}", index));
            }
        }
    }
    Ok(children)
}

fn worker_command(exe: &Path, config: &ShadowConfig, forward: &Forward, index: usize) -> Command {
    let mut command = Command::new(exe);
    if forward.verbose > 0 {
        command.arg(format!("-{}", "v".repeat(forward.verbose as usize)));
    }
    if let Some(path) = &forward.config {
        command.arg("--config").arg(path);
    }
    command
        .arg("--root")
        .arg(&config.root)
        .arg("worker")
        .arg("--index")
        .arg(index.to_string())
        .arg("--files")
        .arg(config.files.to_string())
        .arg("--rebind")
        .arg(config.rebind.to_string());
    if config.serialize_workers {
        command.arg("--serialize");
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageshadow_core::redirect::RebindStrategy;

    fn args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn worker_command_forwards_settings() {
        let config = ShadowConfig::default()
            .with_root("/w")
            .with_files(2)
            .with_rebind(RebindStrategy::Remap)
            .with_serialize_workers(true);
        let forward = Forward {
            verbose: 2,
            config: Some(PathBuf::from("run.yaml")),
        };

        let command = worker_command(Path::new("/bin/pageshadow"), &config, &forward, 3);
        assert_eq!(
            args(&command),
            vec![
                "-vv", "--config", "run.yaml", "--root", "/w", "worker", "--index", "3",
                "--files", "2", "--rebind", "remap", "--serialize",
            ]
        );
    }

    #[test]
    fn quiet_worker_command_has_no_verbosity_flag() {
        let command = worker_command(
            Path::new("/bin/pageshadow"),
            &ShadowConfig::default(),
            &Forward::default(),
            0,
        );
        let args = args(&command);
        assert_eq!(args[0], "--root");
        assert!(!args.contains(&"--serialize".to_string()));
    }

    #[tokio::test]
    async fn missing_files_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShadowConfig::default().with_root(dir.path());

        let err = run(&config, &Forward::default()).await.unwrap_err();
        assert!(err.to_string().contains("pageshadow init"));
    }
}
