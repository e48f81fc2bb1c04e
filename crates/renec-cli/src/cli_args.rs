use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_u16(value: &str) -> Result<u16, String> {
    let parsed = value
        .parse::<u16>()
        .map_err(|error| format!("failed to parse port: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "renec-deploy",
    about = "Provision a renec validator host over SSH and (re)start its services",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "RENEC_HOST",
        help = "Address of the target host reachable over SSH"
    )]
    pub host: String,

    #[arg(
        long = "ssh-user",
        env = "RENEC_SSH_USER",
        default_value = "ubuntu",
        help = "Login user on the target host; also owns the data volume and toolchain"
    )]
    pub ssh_user: String,

    #[arg(
        long = "ssh-key",
        env = "RENEC_SSH_KEYS",
        value_delimiter = ',',
        help = "Private key file passed to ssh with -i. Repeatable"
    )]
    pub ssh_key: Vec<PathBuf>,

    #[arg(
        long = "ssh-port",
        env = "RENEC_SSH_PORT",
        default_value_t = 22,
        value_parser = parse_positive_u16,
        help = "SSH port on the target host"
    )]
    pub ssh_port: u16,

    #[arg(
        long = "forward-agent",
        env = "RENEC_FORWARD_AGENT",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Forward the local SSH agent to the target host"
    )]
    pub forward_agent: bool,

    #[arg(
        long = "renec-version",
        env = "RENEC_VERSION",
        default_value = "1.9.29",
        help = "Pinned renec toolchain release to install"
    )]
    pub renec_version: String,

    #[arg(
        long = "data-path",
        env = "RENEC_DATA_PATH",
        default_value = "/home/ubuntu/renec-cluster",
        help = "Mount path of the data volume holding keypairs, ledger and snapshots"
    )]
    pub data_path: String,

    #[arg(
        long = "genesis",
        env = "RENEC_GENESIS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Start the node as the cluster's genesis validator"
    )]
    pub genesis: bool,

    #[arg(
        long,
        env = "RENEC_ENTRYPOINT",
        default_value = "34.228.109.119:8001",
        help = "Gossip entrypoint (host:port) used when joining an existing cluster"
    )]
    pub entrypoint: String,

    #[arg(
        long = "expected-genesis-hash",
        env = "RENEC_EXPECTED_GENESIS_HASH",
        default_value = "6bWMx8nFapGtRQdc5r1Dw5UimiX7YkJLKi6E4VC4LsHS",
        help = "Genesis hash the joining validator must observe"
    )]
    pub expected_genesis_hash: String,

    #[arg(
        long = "known-validator",
        env = "RENEC_KNOWN_VALIDATOR",
        default_value = "HBXxbWBy6JRhvT61r4QxFg1FBQdMxeAbcv3q12XWH3xd",
        help = "Trusted validator identity for snapshot and RPC sources"
    )]
    pub known_validator: String,

    #[arg(
        long = "gossip-port",
        env = "RENEC_GOSSIP_PORT",
        default_value_t = 8001,
        value_parser = parse_positive_u16
    )]
    pub gossip_port: u16,

    #[arg(
        long = "rpc-port",
        env = "RENEC_RPC_PORT",
        default_value_t = 8888,
        value_parser = parse_positive_u16
    )]
    pub rpc_port: u16,

    #[arg(
        long = "dynamic-port-range",
        env = "RENEC_DYNAMIC_PORT_RANGE",
        default_value = "8000-8020",
        help = "Validator dynamic port range as <start>-<end>"
    )]
    pub dynamic_port_range: String,

    #[arg(
        long = "tpu-coalesce-ms",
        env = "RENEC_TPU_COALESCE_MS",
        default_value_t = 50,
        help = "TPU coalesce window in milliseconds (genesis validator only)"
    )]
    pub tpu_coalesce_ms: u64,

    #[arg(
        long = "staging-dir",
        env = "RENEC_STAGING_DIR",
        help = "Remote directory unit files are uploaded to before installation. Defaults to /home/<ssh-user>/renec-deploy"
    )]
    pub staging_dir: Option<String>,

    #[arg(
        long = "unit-template-dir",
        env = "RENEC_UNIT_TEMPLATE_DIR",
        help = "Local directory whose *.service.j2 files override the embedded unit templates"
    )]
    pub unit_template_dir: Option<PathBuf>,

    #[arg(
        long = "system-info-command",
        env = "RENEC_SYSTEM_INFO_COMMAND",
        default_value = "/usr/local/bin/node_exporter",
        help = "Start command of the renec-sys-info service"
    )]
    pub system_info_command: String,

    #[arg(
        long = "plan",
        env = "RENEC_PLAN",
        default_value_t = false,
        help = "Probe the host and print the derived plan without changing anything"
    )]
    pub plan: bool,

    #[arg(
        long = "json",
        env = "RENEC_JSON",
        default_value_t = false,
        help = "Emit the deployment report or plan as JSON"
    )]
    pub json: bool,
}
