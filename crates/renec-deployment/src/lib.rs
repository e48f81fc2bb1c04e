//! Provisioning flow for a renec validator host.
//!
//! Covers storage provisioning, toolchain installation, bootstrap-state
//! resolution, validator command construction, and systemd unit rendering,
//! installation and restarts, sequenced by [`ProvisioningOrchestrator`].

pub mod bootstrap_state;
pub mod deployment_config;
pub mod provisioning_orchestrator;
pub mod provisioning_report;
pub mod service_installer;
pub mod service_manager;
pub mod service_unit;
pub mod software_installer;
pub mod storage_provisioner;
pub mod validator_command;

pub use bootstrap_state::{BootstrapState, BootstrapStateResolver};
pub use deployment_config::{DeploymentConfig, NetworkParameters, PortRange, StorageSpec};
pub use provisioning_orchestrator::{DeploymentError, ProvisioningOrchestrator};
pub use provisioning_report::{
    render_deployment_plan, render_provisioning_summary, DeploymentPlan, ProvisioningReport,
    StepOutcome,
};
pub use service_installer::ServiceInstaller;
pub use service_manager::{ServiceAction, ServiceError, ServiceManager};
pub use service_unit::{render_unit_template, RenderError, ServiceUnitSpec, UnitTemplates};
pub use software_installer::{InstallError, InstallStep, SoftwareInstallReport, SoftwareInstaller};
pub use storage_provisioner::{ProvisionError, StorageProvisioner, StorageStep};
pub use validator_command::{
    build_validator_command, ValidatorArg, ValidatorCommand, ValidatorCommandBuilder,
    ValidatorVariant,
};
