mod bootstrap_helpers;
mod deploy_runtime;

use anyhow::Result;
use clap::Parser;
use renec_cli::{build_deployment_config, Cli};
use renec_remote::{SshRemoteHost, SshTarget};

use crate::bootstrap_helpers::init_tracing;
use crate::deploy_runtime::{execute_deploy_command, execute_plan_command};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_deployment_config(&cli)?;
    let remote = SshRemoteHost::new(SshTarget {
        host: config.host.clone(),
        user: config.ssh_user.clone(),
        port: config.ssh_port,
        identity_files: config.ssh_keys.clone(),
        forward_agent: config.forward_agent,
    });
    if cli.plan {
        execute_plan_command(&remote, &config, cli.json).await
    } else {
        execute_deploy_command(&remote, &config, cli.json).await
    }
}
