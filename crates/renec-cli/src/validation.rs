use anyhow::{bail, Result};
use renec_deployment::deployment_config::default_staging_dir;
use renec_deployment::{DeploymentConfig, NetworkParameters, PortRange};

use crate::Cli;

/// Account the embedded unit templates run the validator under.
const EMBEDDED_TEMPLATE_USER: &str = "ubuntu";

/// Validates `cli` and folds it into the immutable per-run configuration.
pub fn build_deployment_config(cli: &Cli) -> Result<DeploymentConfig> {
    let host = cli.host.trim();
    if host.is_empty() {
        bail!("--host cannot be empty");
    }
    let ssh_user = cli.ssh_user.trim();
    if ssh_user.is_empty() {
        bail!("--ssh-user cannot be empty");
    }
    validate_version(&cli.renec_version)?;
    validate_absolute_path("--data-path", &cli.data_path)?;
    validate_entrypoint(&cli.entrypoint)?;
    if cli.expected_genesis_hash.trim().is_empty() {
        bail!("--expected-genesis-hash cannot be empty");
    }
    if cli.known_validator.trim().is_empty() {
        bail!("--known-validator cannot be empty");
    }
    let dynamic_port_range = cli
        .dynamic_port_range
        .parse::<PortRange>()
        .map_err(|error| anyhow::anyhow!("invalid --dynamic-port-range: {error}"))?;

    let staging_dir = match cli.staging_dir.as_deref() {
        Some(dir) => {
            validate_absolute_path("--staging-dir", dir)?;
            dir.trim_end_matches('/').to_string()
        }
        None => default_staging_dir(ssh_user),
    };
    if let Some(dir) = cli.unit_template_dir.as_deref() {
        if !dir.is_dir() {
            bail!(
                "--unit-template-dir '{}' is not a directory",
                dir.display()
            );
        }
    }
    if ssh_user != EMBEDDED_TEMPLATE_USER && cli.unit_template_dir.is_none() {
        bail!(
            "--ssh-user '{ssh_user}' requires --unit-template-dir; the embedded unit templates run as {EMBEDDED_TEMPLATE_USER}"
        );
    }
    if cli.system_info_command.trim().is_empty() {
        bail!("--system-info-command cannot be empty");
    }

    Ok(DeploymentConfig {
        host: host.to_string(),
        ssh_user: ssh_user.to_string(),
        ssh_port: cli.ssh_port,
        ssh_keys: cli.ssh_key.clone(),
        forward_agent: cli.forward_agent,
        renec_version: cli.renec_version.trim().to_string(),
        data_path: cli.data_path.trim_end_matches('/').to_string(),
        is_genesis: cli.genesis,
        network: NetworkParameters {
            entrypoint: cli.entrypoint.trim().to_string(),
            expected_genesis_hash: cli.expected_genesis_hash.trim().to_string(),
            known_validator: cli.known_validator.trim().to_string(),
            gossip_port: cli.gossip_port,
            rpc_port: cli.rpc_port,
            dynamic_port_range,
            tpu_coalesce_ms: cli.tpu_coalesce_ms,
        },
        staging_dir,
        unit_template_dir: cli.unit_template_dir.clone(),
        system_info_command: cli.system_info_command.trim().to_string(),
    })
}

fn validate_version(version: &str) -> Result<()> {
    let version = version.trim();
    let well_formed = !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()));
    if !well_formed {
        bail!("--renec-version '{version}' must be a dotted numeric release such as 1.9.29");
    }
    Ok(())
}

fn validate_absolute_path(flag: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("{flag} '{path}' must be an absolute path");
    }
    if path.chars().any(char::is_whitespace) {
        bail!("{flag} '{path}' must not contain whitespace");
    }
    if path.trim_end_matches('/').is_empty() {
        bail!("{flag} cannot be the filesystem root");
    }
    Ok(())
}

fn validate_entrypoint(entrypoint: &str) -> Result<()> {
    let Some((host, port)) = entrypoint.trim().rsplit_once(':') else {
        bail!("--entrypoint '{entrypoint}' must use the form host:port");
    };
    if host.is_empty() {
        bail!("--entrypoint '{entrypoint}' is missing a host");
    }
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(()),
        _ => bail!("--entrypoint '{entrypoint}' has an invalid port '{port}'"),
    }
}
