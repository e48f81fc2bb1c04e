use chrono::Utc;
use renec_remote::{ProbeError, RemoteExecutor};
use thiserror::Error;

use crate::bootstrap_state::BootstrapStateResolver;
use crate::deployment_config::{DeploymentConfig, StorageSpec};
use crate::provisioning_report::{DeploymentPlan, ProvisioningReport};
use crate::service_installer::ServiceInstaller;
use crate::service_manager::{ServiceError, ServiceManager};
use crate::service_unit::{
    ServiceUnitSpec, UnitTemplates, SYS_INFO_SERVICE, SYS_TUNER_SERVICE, VALIDATOR_SERVICE,
};
use crate::software_installer::{InstallError, SoftwareInstaller};
use crate::storage_provisioner::{ProvisionError, StorageProvisioner};
use crate::validator_command::build_validator_command;

const SYS_TUNER_BINARY: &str = "renec-sys-tuner";

/// First failing phase of a deployment run. Nothing is rolled back.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("storage provisioning failed: {0}")]
    Storage(#[from] ProvisionError),
    #[error("software installation failed: {0}")]
    Install(#[from] InstallError),
    #[error("host probe failed: {0}")]
    Bootstrap(#[from] ProbeError),
    #[error("service setup failed: {0}")]
    Service(#[from] ServiceError),
}

/// Sequences one deployment run against a single host. Steps run strictly in
/// order and the first failure aborts the run.
pub struct ProvisioningOrchestrator<'a, E: RemoteExecutor> {
    remote: &'a E,
    config: &'a DeploymentConfig,
    templates: UnitTemplates,
}

impl<'a, E: RemoteExecutor> ProvisioningOrchestrator<'a, E> {
    pub fn new(remote: &'a E, config: &'a DeploymentConfig, templates: UnitTemplates) -> Self {
        Self {
            remote,
            config,
            templates,
        }
    }

    #[tracing::instrument(skip_all, fields(host = %self.remote.host(), genesis = self.config.is_genesis))]
    pub async fn run(&self) -> Result<ProvisioningReport, DeploymentError> {
        let started_at = Utc::now();
        let config = self.config;

        let storage = StorageProvisioner::new(self.remote)
            .provision(&StorageSpec::renec_raid(config))
            .await?;
        let software = SoftwareInstaller::new(self.remote).install(config).await?;

        // The snapshot probe must see the mounted volume, not the bare mount point.
        let bootstrap = BootstrapStateResolver::new(self.remote)
            .resolve(config)
            .await?;
        let command = build_validator_command(bootstrap, config);
        let validator_command = command.render();

        let installer = ServiceInstaller::new(self.remote, &config.staging_dir);
        let manager = ServiceManager::new(self.remote);

        self.install_unit(&installer, VALIDATOR_SERVICE, &validator_command, &self.templates.validator)
            .await?;
        let tuner_command = format!(
            "{} --user {}",
            config.toolchain_binary(SYS_TUNER_BINARY),
            config.ssh_user
        );
        self.install_unit(&installer, SYS_TUNER_SERVICE, &tuner_command, &self.templates.sys_tuner)
            .await?;

        let mut restarted_services = Vec::new();
        for service in [SYS_TUNER_SERVICE, VALIDATOR_SERVICE] {
            manager.enable_and_restart(service).await?;
            restarted_services.push(service.to_string());
        }

        self.install_unit(
            &installer,
            SYS_INFO_SERVICE,
            &config.system_info_command,
            &self.templates.sys_info,
        )
        .await?;
        manager.enable_and_restart(SYS_INFO_SERVICE).await?;
        restarted_services.push(SYS_INFO_SERVICE.to_string());

        let report = ProvisioningReport {
            host: config.host.clone(),
            started_at,
            finished_at: Utc::now(),
            storage,
            toolchain: software.toolchain,
            path_entry: software.path_entry,
            bootstrap,
            variant: bootstrap.variant(),
            validator_command,
            restarted_services,
        };
        tracing::info!(
            storage = report.storage.as_str(),
            toolchain = report.toolchain.as_str(),
            variant = report.variant.as_str(),
            "deployment complete"
        );
        Ok(report)
    }

    /// Probes the host and derives the validator command without mutating
    /// anything.
    pub async fn plan(&self) -> Result<DeploymentPlan, DeploymentError> {
        let config = self.config;
        let storage_provisioned = self.remote.path_exists(&config.data_path).await?;
        let toolchain_installed = self
            .remote
            .path_exists(&config.software_config_dir())
            .await?;
        let bootstrap = BootstrapStateResolver::new(self.remote)
            .resolve(config)
            .await?;
        let command = build_validator_command(bootstrap, config);
        Ok(DeploymentPlan {
            host: config.host.clone(),
            storage_provisioned,
            toolchain_installed,
            bootstrap,
            variant: bootstrap.variant(),
            validator_command: command.render(),
        })
    }

    async fn install_unit(
        &self,
        installer: &ServiceInstaller<'_>,
        service_name: &str,
        start_command: &str,
        template_source: &str,
    ) -> Result<(), DeploymentError> {
        let unit = ServiceUnitSpec {
            service_name: service_name.to_string(),
            start_command: start_command.to_string(),
            template_source: template_source.to_string(),
        };
        let content = unit.render().map_err(ServiceError::from)?;
        installer.install(&content, service_name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use renec_remote::InMemoryRemoteHost;

    use super::{DeploymentError, ProvisioningOrchestrator};
    use crate::deployment_config::DeploymentConfig;
    use crate::provisioning_report::StepOutcome;
    use crate::service_unit::UnitTemplates;
    use crate::validator_command::ValidatorVariant;

    const HOST: &str = "54.85.162.144";
    const BASHRC: &str = "/home/ubuntu/.bashrc";
    const CONFIG_DIR: &str = "/home/ubuntu/.config/renec";

    fn fresh_host() -> InMemoryRemoteHost {
        InMemoryRemoteHost::new(HOST)
            .with_file(BASHRC, "# ~/.bashrc\n")
            .with_side_effect("curl -sSfL", CONFIG_DIR)
    }

    fn position(lines: &[String], fragment: &str) -> usize {
        lines
            .iter()
            .position(|line| line.contains(fragment))
            .unwrap_or_else(|| panic!("missing command containing '{fragment}'"))
    }

    #[tokio::test]
    async fn functional_run_on_fresh_host_applies_every_step_in_order() {
        let host = fresh_host();
        let config = DeploymentConfig::for_host(HOST);
        let report = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
            .run()
            .await
            .expect("run");

        assert_eq!(report.storage, StepOutcome::Applied);
        assert_eq!(report.toolchain, StepOutcome::Applied);
        assert_eq!(report.variant, ValidatorVariant::JoinFullBootstrap);
        assert_eq!(
            report.restarted_services,
            vec!["renec-sys-tuner", "renec", "renec-sys-info"]
        );

        let lines = host.executed_lines().await;
        let mdadm = position(&lines, "mdadm --create");
        let fetch = position(&lines, "curl -sSfL");
        let snapshot_probe = position(&lines, "test -d /home/ubuntu/renec-cluster/snapshot");
        let tuner_restart = position(&lines, "systemctl restart renec-sys-tuner.service");
        let validator_restart = position(&lines, "systemctl restart renec.service");
        assert!(mdadm < fetch);
        assert!(fetch < snapshot_probe);
        assert!(snapshot_probe < tuner_restart);
        assert!(tuner_restart < validator_restart);

        let unit = host
            .file("/etc/systemd/system/renec-sys-tuner.service")
            .await
            .expect("tuner unit");
        assert!(unit.contains(
            "ExecStart=/home/ubuntu/.local/share/renec/install/active_release/bin/renec-sys-tuner --user ubuntu"
        ));
    }

    #[tokio::test]
    async fn integration_second_run_skips_storage_and_toolchain() {
        let host = fresh_host();
        let config = DeploymentConfig::for_host(HOST);
        let orchestrator = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded());
        orchestrator.run().await.expect("first run");
        let second = orchestrator.run().await.expect("second run");
        assert_eq!(second.storage, StepOutcome::Skipped);
        assert_eq!(second.toolchain, StepOutcome::Skipped);
        assert_eq!(second.path_entry, StepOutcome::Skipped);

        let lines = host.mutating_lines().await;
        assert_eq!(lines.iter().filter(|line| line.contains("mdadm --create")).count(), 1);
        assert_eq!(lines.iter().filter(|line| line.contains("curl -sSfL")).count(), 1);
    }

    #[tokio::test]
    async fn regression_storage_failure_aborts_before_any_service_step() {
        let host = fresh_host();
        host.fail_on("mkfs.ext4").await;
        let config = DeploymentConfig::for_host(HOST);
        let error = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
            .run()
            .await
            .expect_err("storage failure");
        assert!(matches!(error, DeploymentError::Storage(_)));
        let lines = host.executed_lines().await;
        assert!(!lines.iter().any(|line| line.contains("curl")));
        assert!(!lines.iter().any(|line| line.contains("systemctl")));
        assert!(host.uploads().await.is_empty());
    }

    #[tokio::test]
    async fn regression_tuner_restart_failure_leaves_validator_untouched() {
        let host = fresh_host();
        host.fail_on("restart renec-sys-tuner").await;
        let config = DeploymentConfig::for_host(HOST);
        let error = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
            .run()
            .await
            .expect_err("tuner failure");
        assert!(matches!(error, DeploymentError::Service(_)));
        assert!(!host
            .executed_lines()
            .await
            .iter()
            .any(|line| line.contains("systemctl enable renec.service")));
    }

    #[tokio::test]
    async fn functional_plan_is_read_only() {
        let host = fresh_host();
        let config = DeploymentConfig::for_host(HOST);
        let plan = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
            .plan()
            .await
            .expect("plan");
        assert!(!plan.storage_provisioned);
        assert!(!plan.toolchain_installed);
        assert_eq!(plan.variant, ValidatorVariant::JoinFullBootstrap);
        assert!(plan.validator_command.contains("--known-validator"));
        assert!(host.mutating_lines().await.is_empty());
        assert!(host.uploads().await.is_empty());
    }
}
