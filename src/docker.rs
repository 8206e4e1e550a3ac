//! Docker executor for evaluation containers

use anyhow::Result;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DockerSettings;

/// Docker executor
pub struct DockerExecutor {
    docker: Docker,
}

impl DockerExecutor {
    /// Connect to the local Docker daemon and verify it responds
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow::anyhow!("Failed to connect to Docker: {}", e))?;

        docker
            .ping()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to ping Docker: {}", e))?;

        info!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    /// Ping the daemon (doctor check)
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| anyhow::anyhow!("Docker daemon not responding: {}", e))?;
        Ok(())
    }

    /// Pull an image if not present locally
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                debug!("Image {} already exists", image);
                return Ok(());
            }
            Err(_) => {
                info!("Pulling image: {}", image);
            }
        }

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(anyhow::anyhow!("Failed to pull image '{}': {}", image, e));
                }
            }
        }

        info!("Image {} pulled successfully", image);
        Ok(())
    }

    /// Create an evaluation container from `image`, held open so commands
    /// can be exec'd into it.
    pub async fn launch(&self, image: &str, settings: &DockerSettings) -> Result<ContainerRun> {
        self.ensure_image(image).await?;

        let container_name = format!(
            "swe-eval-{}",
            &uuid::Uuid::new_v4().as_simple().to_string()[..8]
        );

        let memory = parse_memory_limit(&settings.memory_limit)?;
        let nano_cpus = (settings.cpu_limit * 1_000_000_000.0) as i64;

        let container_config = Config {
            image: Some(image.to_string()),
            hostname: Some("eval".to_string()),
            // Override CMD to keep the container running for exec
            cmd: Some(vec![
                "tail".to_string(),
                "-f".to_string(),
                "/dev/null".to_string(),
            ]),
            env: Some(vec!["TERM=xterm-256color".to_string()]),
            host_config: Some(HostConfig {
                memory: Some(memory),
                nano_cpus: Some(nano_cpus),
                network_mode: Some(settings.network_mode.clone()),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: &container_name,
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create container: {}", e))?;

        info!("Created container: {}", response.id);

        Ok(ContainerRun {
            docker: self.docker.clone(),
            container_id: response.id,
            container_name,
        })
    }
}

/// A running evaluation container
pub struct ContainerRun {
    docker: Docker,
    container_id: String,
    container_name: String,
}

impl ContainerRun {
    /// Start the container
    pub async fn start(&self) -> Result<()> {
        self.docker
            .start_container(&self.container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start container: {}", e))?;

        info!("Started container: {}", self.container_name);
        Ok(())
    }

    /// Execute a command in the container
    pub async fn exec(&self, cmd: &[&str]) -> Result<ExecOutcome> {
        let exec = self
            .docker
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(cmd.iter().map(|s| s.to_string()).collect()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create exec: {}", e))?;

        let start = std::time::Instant::now();

        let result = match self.docker.start_exec(&exec.id, None).await {
            Ok(StartExecResults::Attached { mut output, .. }) => {
                let mut stdout = Vec::new();
                let mut stderr = Vec::new();

                while let Some(Ok(msg)) = output.next().await {
                    match msg {
                        LogOutput::StdOut { message } => stdout.extend(message),
                        LogOutput::StdErr { message } => stderr.extend(message),
                        _ => {}
                    }
                }

                Ok(ExecOutcome {
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr: String::from_utf8_lossy(&stderr).to_string(),
                    exit_code: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(StartExecResults::Detached) => Ok(ExecOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(e) => Err(anyhow::anyhow!("Failed to start exec: {}", e)),
        }?;

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to inspect exec: {}", e))?;

        Ok(ExecOutcome {
            exit_code: inspect.exit_code.unwrap_or(-1) as i32,
            ..result
        })
    }

    /// Run a shell command string through `sh -c`
    pub async fn shell(&self, command: &str) -> Result<ExecOutcome> {
        self.exec(&["sh", "-c", command]).await
    }

    /// Write `contents` to `path` inside the container
    pub async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        // heredoc with a delimiter unlikely to collide with patch content
        let script = format!(
            "cat > {} << 'SWE_HARNESS_EOF'\n{}\nSWE_HARNESS_EOF",
            path, contents
        );
        let outcome = self.shell(&script).await?;
        if outcome.exit_code != 0 {
            anyhow::bail!(
                "failed to write {} in container: {}",
                path,
                outcome.stderr.trim()
            );
        }
        Ok(())
    }

    /// Run a script with a timeout; a timed-out run comes back with
    /// `timed_out` set instead of an error.
    pub async fn run_script(&self, script: &str, limit: Duration) -> Result<ScriptOutcome> {
        self.write_file("/tmp/run.sh", script).await?;
        let outcome = self.shell("chmod +x /tmp/run.sh").await?;
        if outcome.exit_code != 0 {
            anyhow::bail!("failed to prepare script: {}", outcome.stderr.trim());
        }

        match timeout(limit, self.exec(&["/tmp/run.sh"])).await {
            Ok(result) => Ok(ScriptOutcome {
                exec: result?,
                timed_out: false,
            }),
            Err(_) => {
                warn!("script timed out after {}s", limit.as_secs());
                Ok(ScriptOutcome {
                    exec: ExecOutcome {
                        stdout: String::new(),
                        stderr: format!("timed out after {}s", limit.as_secs()),
                        exit_code: -1,
                        duration_ms: limit.as_millis() as u64,
                    },
                    timed_out: true,
                })
            }
        }
    }

    /// Container logs (stdout + stderr)
    pub async fn logs(&self) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = String::new();
        let mut stream = self.docker.logs(&self.container_id, Some(options));

        while let Some(result) = stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    logs.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Error reading logs: {}", e);
                    break;
                }
            }
        }

        Ok(logs)
    }

    /// Stop the container
    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.docker.stop_container(&self.container_id, None).await {
            warn!("Failed to stop container: {}", e);
        }
        Ok(())
    }

    /// Force-remove the container
    pub async fn remove(&self) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(&self.container_id, Some(options))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to remove container: {}", e))?;

        debug!("Removed container: {}", self.container_name);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.container_id
    }
}

/// Result of executing a command
#[derive(Clone, Debug)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Result of a script run under a timeout
#[derive(Clone, Debug)]
pub struct ScriptOutcome {
    pub exec: ExecOutcome,
    pub timed_out: bool,
}

/// Parse memory limit string (e.g., "2g", "512m") to bytes
pub fn parse_memory_limit(limit: &str) -> Result<i64> {
    let limit = limit.to_lowercase();

    if let Some(num) = limit.strip_suffix('g') {
        let n: i64 = num
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid memory limit"))?;
        Ok(n * 1024 * 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('m') {
        let n: i64 = num
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid memory limit"))?;
        Ok(n * 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('k') {
        let n: i64 = num
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid memory limit"))?;
        Ok(n * 1024)
    } else {
        limit
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid memory limit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("2g").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("1024k").unwrap(), 1024 * 1024);
        assert_eq!(parse_memory_limit("4096").unwrap(), 4096);
        assert!(parse_memory_limit("lots").is_err());
    }

    #[test]
    fn test_exec_outcome() {
        let outcome = ExecOutcome {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            exit_code: 0,
            duration_ms: 5,
        };
        assert!(outcome.success());
        assert_eq!(outcome.output(), "outerr");
    }
}
