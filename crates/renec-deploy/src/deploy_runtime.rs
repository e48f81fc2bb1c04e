use anyhow::{Context, Result};
use renec_deployment::{
    render_deployment_plan, render_provisioning_summary, DeploymentConfig, DeploymentPlan,
    ProvisioningOrchestrator, ProvisioningReport, UnitTemplates,
};
use renec_remote::RemoteExecutor;

pub(crate) async fn execute_deploy_command<E: RemoteExecutor>(
    remote: &E,
    config: &DeploymentConfig,
    json: bool,
) -> Result<()> {
    let report = run_deployment(remote, config).await?;
    println!("{}", render_report_output(&report, json)?);
    Ok(())
}

pub(crate) async fn execute_plan_command<E: RemoteExecutor>(
    remote: &E,
    config: &DeploymentConfig,
    json: bool,
) -> Result<()> {
    let plan = plan_deployment(remote, config).await?;
    println!("{}", render_plan_output(&plan, json)?);
    Ok(())
}

async fn run_deployment<E: RemoteExecutor>(
    remote: &E,
    config: &DeploymentConfig,
) -> Result<ProvisioningReport> {
    let templates = UnitTemplates::load(config.unit_template_dir.as_deref())?;
    ProvisioningOrchestrator::new(remote, config, templates)
        .run()
        .await
        .with_context(|| format!("deployment to {} failed", config.host))
}

async fn plan_deployment<E: RemoteExecutor>(
    remote: &E,
    config: &DeploymentConfig,
) -> Result<DeploymentPlan> {
    ProvisioningOrchestrator::new(remote, config, UnitTemplates::embedded())
        .plan()
        .await
        .with_context(|| format!("failed to plan deployment to {}", config.host))
}

fn render_report_output(report: &ProvisioningReport, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(report)
            .context("failed to render deployment report json");
    }
    Ok(render_provisioning_summary(report))
}

fn render_plan_output(plan: &DeploymentPlan, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(plan).context("failed to render deployment plan json");
    }
    Ok(render_deployment_plan(plan))
}
