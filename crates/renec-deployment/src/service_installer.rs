use renec_remote::{RemoteCommand, RemoteError, RemoteExecutor};

use crate::service_manager::{ServiceAction, ServiceError};
use crate::service_unit::unit_file_name;

pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system/";

/// Puts rendered unit files in place: upload to a staging directory owned by
/// the login user, then copy into the systemd unit directory with sudo.
pub struct ServiceInstaller<'a> {
    remote: &'a dyn RemoteExecutor,
    staging_dir: &'a str,
}

impl<'a> ServiceInstaller<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor, staging_dir: &'a str) -> Self {
        Self {
            remote,
            staging_dir,
        }
    }

    pub fn staging_path(&self, service_name: &str) -> String {
        format!(
            "{}/{}",
            self.staging_dir.trim_end_matches('/'),
            unit_file_name(service_name)
        )
    }

    pub async fn install(&self, unit_content: &str, service_name: &str) -> Result<(), ServiceError> {
        let staged = self.staging_path(service_name);
        let step_error = |action: ServiceAction| {
            move |source: RemoteError| ServiceError::Step {
                service: service_name.to_string(),
                action,
                source,
            }
        };
        tracing::info!(
            host = self.remote.host(),
            service = service_name,
            staged = %staged,
            "installing unit file"
        );

        self.remote
            .run(&RemoteCommand::user(["mkdir", "-p", self.staging_dir]))
            .await
            .map_err(step_error(ServiceAction::Stage))?;
        self.remote
            .upload(unit_content.as_bytes(), &staged)
            .await
            .map_err(step_error(ServiceAction::Upload))?;
        self.remote
            .run(&RemoteCommand::sudo(["cp", staged.as_str(), SYSTEMD_UNIT_DIR]))
            .await
            .map_err(step_error(ServiceAction::Install))?;
        self.remote
            .run(&RemoteCommand::sudo(["systemctl", "daemon-reload"]))
            .await
            .map_err(step_error(ServiceAction::Reload))?;
        Ok(())
    }
}
