use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::remote_command::{CommandOutput, RemoteCommand};
use crate::remote_host::{probe_directory, ProbeError, RemoteError, RemoteExecutor, RemoteProbe};

const DEFAULT_SSH_PROGRAM: &str = "ssh";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Connection parameters for one target host.
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_files: Vec<PathBuf>,
    pub forward_agent: bool,
}

/// Remote executor backed by the local OpenSSH client. Every call is one
/// blocking round-trip over a fresh session; no timeouts beyond ssh's own.
#[derive(Debug, Clone)]
pub struct SshRemoteHost {
    target: SshTarget,
    ssh_program: String,
}

impl SshRemoteHost {
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            ssh_program: DEFAULT_SSH_PROGRAM.to_string(),
        }
    }

    pub fn with_ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    fn ssh_args(&self, remote_line: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.target.port.to_string(),
        ];
        for identity in &self.target.identity_files {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        if self.target.forward_agent {
            args.push("-A".to_string());
        }
        args.push(format!("{}@{}", self.target.user, self.target.host));
        args.push("--".to_string());
        args.push(remote_line.to_string());
        args
    }

    async fn spawn_remote(
        &self,
        remote_line: &str,
        stdin_payload: Option<(&[u8], &str)>,
    ) -> Result<CommandOutput, RemoteError> {
        let mut command = Command::new(&self.ssh_program);
        command.args(self.ssh_args(remote_line));
        command.kill_on_drop(true);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|source| RemoteError::Spawn {
            program: self.ssh_program.clone(),
            source,
        })?;

        if let Some((payload, destination)) = stdin_payload {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(payload)
                    .await
                    .map_err(|source| RemoteError::Upload {
                        destination: destination.to_string(),
                        source,
                    })?;
                stdin.shutdown().await.map_err(|source| RemoteError::Upload {
                    destination: destination.to_string(),
                    source,
                })?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RemoteError::Spawn {
                program: self.ssh_program.clone(),
                source,
            })?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl RemoteProbe for SshRemoteHost {
    async fn path_exists(&self, path: &str) -> Result<bool, ProbeError> {
        probe_directory(self, path).await
    }
}

#[async_trait]
impl RemoteExecutor for SshRemoteHost {
    fn host(&self) -> &str {
        &self.target.host
    }

    async fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        self.spawn_remote(&command.render(), None).await
    }

    async fn upload(&self, content: &[u8], destination: &str) -> Result<(), RemoteError> {
        let remote_line = format!("cat > {}", shell_words::quote(destination));
        let output = self
            .spawn_remote(&remote_line, Some((content, destination)))
            .await?;
        if !output.succeeded() {
            return Err(RemoteError::CommandFailed {
                command: remote_line,
                status: output.describe_status(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
