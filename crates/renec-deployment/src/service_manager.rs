use std::fmt;

use renec_remote::{RemoteCommand, RemoteError, RemoteExecutor};
use thiserror::Error;

use crate::service_unit::{unit_file_name, RenderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Stage,
    Upload,
    Install,
    Reload,
    Enable,
    Restart,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Upload => "upload",
            Self::Install => "install",
            Self::Reload => "reload",
            Self::Enable => "enable",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to {action} service '{service}': {source}")]
    Step {
        service: String,
        action: ServiceAction,
        #[source]
        source: RemoteError,
    },
}

/// Drives systemd on the target host.
pub struct ServiceManager<'a> {
    remote: &'a dyn RemoteExecutor,
}

impl<'a> ServiceManager<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor) -> Self {
        Self { remote }
    }

    /// Enables the unit for boot, then restarts it unconditionally. A running
    /// validator is interrupted.
    pub async fn enable_and_restart(&self, service_name: &str) -> Result<(), ServiceError> {
        let unit = unit_file_name(service_name);
        for action in [ServiceAction::Enable, ServiceAction::Restart] {
            tracing::info!(
                host = self.remote.host(),
                service = %unit,
                action = action.as_str(),
                "systemctl"
            );
            self.remote
                .run(&RemoteCommand::sudo(["systemctl", action.as_str(), unit.as_str()]))
                .await
                .map_err(|source| ServiceError::Step {
                    service: service_name.to_string(),
                    action,
                    source,
                })?;
        }
        Ok(())
    }
}
