use async_trait::async_trait;
use thiserror::Error;

use crate::remote_command::{CommandOutput, RemoteCommand};

/// Errors raised by a remote-execution transport.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stream upload to '{destination}': {source}")]
    Upload {
        destination: String,
        #[source]
        source: std::io::Error,
    },
    #[error("remote command `{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

impl RemoteError {
    pub fn command_failed(command: &RemoteCommand, output: &CommandOutput) -> Self {
        Self::CommandFailed {
            command: command.render(),
            status: output.describe_status(),
            stderr: output.stderr.trim().to_string(),
        }
    }
}

/// Remote state could not be determined. Never interpreted as "absent".
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to probe remote path '{path}': {source}")]
    Transport {
        path: String,
        #[source]
        source: RemoteError,
    },
    #[error("probe of remote path '{path}' was inconclusive ({status}): {stderr}")]
    Inconclusive {
        path: String,
        status: String,
        stderr: String,
    },
}

/// Read-only view of the target host's filesystem.
#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn path_exists(&self, path: &str) -> Result<bool, ProbeError>;
}

/// Command execution and file upload against one target host.
#[async_trait]
pub trait RemoteExecutor: RemoteProbe {
    fn host(&self) -> &str;

    /// Runs `command` and returns its output whatever the exit status.
    async fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError>;

    /// Writes `content` to `destination` as the login user.
    async fn upload(&self, content: &[u8], destination: &str) -> Result<(), RemoteError>;

    /// Runs `command` and fails unless it exits successfully.
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        tracing::debug!(host = self.host(), command = %command, "remote command");
        let output = self.execute(command).await?;
        if !output.succeeded() {
            return Err(RemoteError::command_failed(command, &output));
        }
        Ok(output)
    }
}

/// Directory probe shared by transports that speak a POSIX shell: `test -d`
/// exiting 1 means absent, any other non-zero status is inconclusive.
pub async fn probe_directory<E>(executor: &E, path: &str) -> Result<bool, ProbeError>
where
    E: RemoteExecutor + ?Sized,
{
    let command = RemoteCommand::user(["test", "-d", path]);
    let output = executor
        .execute(&command)
        .await
        .map_err(|source| ProbeError::Transport {
            path: path.to_string(),
            source,
        })?;
    match output.status {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(ProbeError::Inconclusive {
            path: path.to_string(),
            status: output.describe_status(),
            stderr: output.stderr.trim().to_string(),
        }),
    }
}
