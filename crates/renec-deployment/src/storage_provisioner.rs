use std::fmt;

use renec_remote::{ProbeError, RemoteCommand, RemoteError, RemoteExecutor};
use thiserror::Error;

use crate::deployment_config::StorageSpec;
use crate::provisioning_report::StepOutcome;

const MDADM_CONFIG_PATH: &str = "/etc/mdadm/mdadm.conf";
const FSTAB_PATH: &str = "/etc/fstab";

/// Ordered steps of a fresh storage provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStep {
    CreateArray,
    FormatFilesystem,
    PersistArrayConfig,
    RegenerateInitramfs,
    CreateMountPoint,
    Mount,
    PersistFstab,
    ChownMountPoint,
}

impl StorageStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateArray => "create-array",
            Self::FormatFilesystem => "format-filesystem",
            Self::PersistArrayConfig => "persist-array-config",
            Self::RegenerateInitramfs => "regenerate-initramfs",
            Self::CreateMountPoint => "create-mount-point",
            Self::Mount => "mount",
            Self::PersistFstab => "persist-fstab",
            Self::ChownMountPoint => "chown-mount-point",
        }
    }
}

impl fmt::Display for StorageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage setup failed. Earlier steps are not rolled back.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("storage spec '{label}' lists no devices")]
    NoDevices { label: String },
    #[error("storage step '{step}' failed: {source}")]
    Step {
        step: StorageStep,
        #[source]
        source: RemoteError,
    },
}

/// The command sequence that turns raw devices into a mounted data volume.
pub fn storage_commands(spec: &StorageSpec) -> Vec<(StorageStep, RemoteCommand)> {
    let mut create = vec![
        "mdadm".to_string(),
        "--create".to_string(),
        "--verbose".to_string(),
        spec.array_device.clone(),
        format!("--level={}", spec.raid_level()),
        format!("--name={}", spec.label),
        format!("--raid-devices={}", spec.devices.len()),
    ];
    create.extend(spec.devices.iter().cloned());

    let fstab_line = spec.fstab_entry().to_string();
    vec![
        (StorageStep::CreateArray, RemoteCommand::sudo(create)),
        (
            StorageStep::FormatFilesystem,
            RemoteCommand::sudo([
                "mkfs.ext4",
                "-F",
                "-L",
                spec.label.as_str(),
                spec.array_device.as_str(),
            ]),
        ),
        (
            StorageStep::PersistArrayConfig,
            RemoteCommand::sudo_shell(format!(
                "mdadm --detail --scan | tee -a {MDADM_CONFIG_PATH}"
            )),
        ),
        (
            StorageStep::RegenerateInitramfs,
            RemoteCommand::sudo(["update-initramfs", "-u"]),
        ),
        (
            StorageStep::CreateMountPoint,
            RemoteCommand::user(["mkdir", "-p", spec.mount_path.as_str()]),
        ),
        (
            StorageStep::Mount,
            RemoteCommand::sudo([
                "mount".to_string(),
                format!("LABEL={}", spec.label),
                spec.mount_path.clone(),
            ]),
        ),
        (
            StorageStep::PersistFstab,
            RemoteCommand::sudo_shell(format!(
                "echo {} >> {FSTAB_PATH}",
                shell_words::quote(&fstab_line)
            )),
        ),
        (
            StorageStep::ChownMountPoint,
            RemoteCommand::sudo([
                "chown".to_string(),
                format!("{owner}:{owner}", owner = spec.owner),
                spec.mount_path.clone(),
            ]),
        ),
    ]
}

/// Creates, formats and mounts the striped data array once per host.
pub struct StorageProvisioner<'a> {
    remote: &'a dyn RemoteExecutor,
}

impl<'a> StorageProvisioner<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor) -> Self {
        Self { remote }
    }

    /// An existing mount path is taken as proof the volume is provisioned;
    /// array health is not re-verified.
    pub async fn provision(&self, spec: &StorageSpec) -> Result<StepOutcome, ProvisionError> {
        if self.remote.path_exists(&spec.mount_path).await? {
            tracing::info!(
                host = self.remote.host(),
                path = %spec.mount_path,
                "data path exists; skipping storage provisioning"
            );
            return Ok(StepOutcome::Skipped);
        }
        if spec.devices.is_empty() {
            return Err(ProvisionError::NoDevices {
                label: spec.label.clone(),
            });
        }

        tracing::info!(
            host = self.remote.host(),
            label = %spec.label,
            devices = spec.devices.len(),
            path = %spec.mount_path,
            "provisioning striped data array"
        );
        for (step, command) in storage_commands(spec) {
            tracing::info!(host = self.remote.host(), step = step.as_str(), "storage step");
            self.remote
                .run(&command)
                .await
                .map_err(|source| ProvisionError::Step { step, source })?;
        }
        Ok(StepOutcome::Applied)
    }
}
