use std::fmt;

use renec_remote::{ProbeError, RemoteCommand, RemoteError, RemoteExecutor};
use serde::Serialize;
use thiserror::Error;

use crate::deployment_config::DeploymentConfig;
use crate::provisioning_report::StepOutcome;

const INSTALL_URL_BASE: &str = "https://s3.amazonaws.com/release.renec.foundation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    RunInstaller,
    PrependPath,
}

impl InstallStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunInstaller => "run-installer",
            Self::PrependPath => "prepend-path",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("install step '{step}' failed: {source}")]
    Step {
        step: InstallStep,
        #[source]
        source: RemoteError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoftwareInstallReport {
    pub toolchain: StepOutcome,
    pub path_entry: StepOutcome,
}

pub fn install_url(version: &str) -> String {
    format!("{INSTALL_URL_BASE}/v{version}/install")
}

/// Shell-startup line that puts the toolchain first on `PATH`.
pub fn path_export_line(config: &DeploymentConfig) -> String {
    format!("export PATH=\"{}:$PATH\"", config.toolchain_bin_dir())
}

/// Installs the pinned renec toolchain and keeps its bin directory on the
/// login shell's `PATH`. The two halves are guarded by separate checks.
pub struct SoftwareInstaller<'a> {
    remote: &'a dyn RemoteExecutor,
}

impl<'a> SoftwareInstaller<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor) -> Self {
        Self { remote }
    }

    pub async fn install(&self, config: &DeploymentConfig) -> Result<SoftwareInstallReport, InstallError> {
        let toolchain = self.install_toolchain(config).await?;
        let path_entry = self.ensure_path_entry(config).await?;
        Ok(SoftwareInstallReport {
            toolchain,
            path_entry,
        })
    }

    async fn install_toolchain(&self, config: &DeploymentConfig) -> Result<StepOutcome, InstallError> {
        let config_dir = config.software_config_dir();
        if self.remote.path_exists(&config_dir).await? {
            tracing::info!(
                host = self.remote.host(),
                path = %config_dir,
                "renec toolchain already installed"
            );
            return Ok(StepOutcome::Skipped);
        }

        let url = install_url(&config.renec_version);
        tracing::info!(
            host = self.remote.host(),
            version = %config.renec_version,
            url = %url,
            "installing renec toolchain"
        );
        self.remote
            .run(&RemoteCommand::user_shell(format!(
                "sh -c \"$(curl -sSfL {url})\""
            )))
            .await
            .map_err(|source| InstallError::Step {
                step: InstallStep::RunInstaller,
                source,
            })?;
        Ok(StepOutcome::Applied)
    }

    async fn ensure_path_entry(&self, config: &DeploymentConfig) -> Result<StepOutcome, InstallError> {
        let startup_file = config.shell_startup_file();
        let line = path_export_line(config);

        let check = RemoteCommand::user(["grep", "-qxF", line.as_str(), startup_file.as_str()]);
        let output = self
            .remote
            .execute(&check)
            .await
            .map_err(|source| ProbeError::Transport {
                path: startup_file.clone(),
                source,
            })?;
        match output.status {
            Some(0) => {
                tracing::debug!(host = self.remote.host(), path = %startup_file, "PATH entry present");
                return Ok(StepOutcome::Skipped);
            }
            Some(1) => {}
            _ => {
                return Err(ProbeError::Inconclusive {
                    path: startup_file,
                    status: output.describe_status(),
                    stderr: output.stderr.trim().to_string(),
                }
                .into());
            }
        }

        let step_error = |source: RemoteError| InstallError::Step {
            step: InstallStep::PrependPath,
            source,
        };
        if self.startup_file_is_empty(&startup_file).await? {
            // sed's line-1 insert is a no-op on a zero-byte file.
            tracing::info!(host = self.remote.host(), path = %startup_file, "writing PATH entry to empty startup file");
            self.remote
                .upload(format!("{line}\n").as_bytes(), &startup_file)
                .await
                .map_err(step_error)?;
            return Ok(StepOutcome::Applied);
        }

        tracing::info!(host = self.remote.host(), path = %startup_file, "prepending toolchain to PATH");
        self.remote
            .run(&RemoteCommand::user([
                "sed".to_string(),
                "-i".to_string(),
                format!("1 i\\{line}"),
                startup_file,
            ]))
            .await
            .map_err(step_error)?;
        Ok(StepOutcome::Applied)
    }

    async fn startup_file_is_empty(&self, startup_file: &str) -> Result<bool, InstallError> {
        let output = self
            .remote
            .execute(&RemoteCommand::user(["test", "-s", startup_file]))
            .await
            .map_err(|source| ProbeError::Transport {
                path: startup_file.to_string(),
                source,
            })?;
        match output.status {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ProbeError::Inconclusive {
                path: startup_file.to_string(),
                status: output.describe_status(),
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
        }
    }
}
