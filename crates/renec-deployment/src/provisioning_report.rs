use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bootstrap_state::BootstrapState;
use crate::validator_command::ValidatorVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped,
}

impl StepOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one completed provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub storage: StepOutcome,
    pub toolchain: StepOutcome,
    pub path_entry: StepOutcome,
    pub bootstrap: BootstrapState,
    pub variant: ValidatorVariant,
    pub validator_command: String,
    pub restarted_services: Vec<String>,
}

/// Read-only view of what a run would do on the host right now.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    pub host: String,
    pub storage_provisioned: bool,
    pub toolchain_installed: bool,
    pub bootstrap: BootstrapState,
    pub variant: ValidatorVariant,
    pub validator_command: String,
}

pub fn render_provisioning_summary(report: &ProvisioningReport) -> String {
    let elapsed_ms = (report.finished_at - report.started_at)
        .num_milliseconds()
        .max(0);
    format!(
        "deployment summary: host={} storage={} toolchain={} path_entry={} first_start={} genesis={} variant={} services={} elapsed_ms={}\nvalidator command: {}",
        report.host,
        report.storage.as_str(),
        report.toolchain.as_str(),
        report.path_entry.as_str(),
        report.bootstrap.first_start,
        report.bootstrap.is_genesis,
        report.variant.as_str(),
        report.restarted_services.join(","),
        elapsed_ms,
        report.validator_command
    )
}

pub fn render_deployment_plan(plan: &DeploymentPlan) -> String {
    format!(
        "deployment plan: host={} storage_provisioned={} toolchain_installed={} first_start={} genesis={} variant={}\nvalidator command: {}",
        plan.host,
        plan.storage_provisioned,
        plan.toolchain_installed,
        plan.bootstrap.first_start,
        plan.bootstrap.is_genesis,
        plan.variant.as_str(),
        plan.validator_command
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::Value;

    use super::{render_provisioning_summary, ProvisioningReport, StepOutcome};
    use crate::bootstrap_state::BootstrapState;
    use crate::validator_command::ValidatorVariant;

    fn report() -> ProvisioningReport {
        let started_at = Utc::now();
        ProvisioningReport {
            host: "54.85.162.144".to_string(),
            started_at,
            finished_at: started_at + Duration::milliseconds(1_500),
            storage: StepOutcome::Skipped,
            toolchain: StepOutcome::Skipped,
            path_entry: StepOutcome::Applied,
            bootstrap: BootstrapState {
                first_start: false,
                is_genesis: false,
            },
            variant: ValidatorVariant::JoinWarmRestart,
            validator_command: "renec-validator --no-snapshot-fetch".to_string(),
            restarted_services: vec!["renec-sys-tuner".to_string(), "renec".to_string()],
        }
    }

    #[test]
    fn unit_summary_lists_step_outcomes_and_command() {
        let summary = render_provisioning_summary(&report());
        assert!(summary.contains("storage=skipped"));
        assert!(summary.contains("path_entry=applied"));
        assert!(summary.contains("variant=join_warm_restart"));
        assert!(summary.contains("services=renec-sys-tuner,renec"));
        assert!(summary.contains("elapsed_ms=1500"));
        assert!(summary.ends_with("validator command: renec-validator --no-snapshot-fetch"));
    }

    #[test]
    fn functional_report_serializes_with_snake_case_enums() {
        let value = serde_json::to_value(report()).expect("serialize");
        assert_eq!(value["storage"], Value::from("skipped"));
        assert_eq!(value["variant"], Value::from("join_warm_restart"));
        assert_eq!(value["bootstrap"]["first_start"], Value::from(false));
    }
}
