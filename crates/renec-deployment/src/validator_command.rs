use std::fmt;

use serde::Serialize;

use crate::bootstrap_state::BootstrapState;
use crate::deployment_config::DeploymentConfig;

pub const VALIDATOR_BINARY: &str = "renec-validator";
pub const NO_SNAPSHOT_FETCH_FLAG: &str = "--no-snapshot-fetch";
pub const NO_GENESIS_FETCH_FLAG: &str = "--no-genesis-fetch";
pub const NO_WAIT_FOR_VOTE_FLAG: &str = "--no-wait-for-vote-to-start-leader";
pub const KNOWN_VALIDATOR_FLAG: &str = "--known-validator";
pub const ONLY_KNOWN_RPC_FLAG: &str = "--only-known-rpc";
pub const ENTRYPOINT_FLAG: &str = "--entrypoint";
pub const EXPECTED_GENESIS_HASH_FLAG: &str = "--expected-genesis-hash";

const IDENTITY_KEYPAIR: &str = "keypairs/validator-keypair.json";
const VOTE_ACCOUNT_KEYPAIR: &str = "keypairs/validator-vote-account.json";
const LEDGER_DIR: &str = "ledger";

/// Which startup command shape a bootstrap state maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorVariant {
    Genesis,
    JoinFullBootstrap,
    JoinWarmRestart,
}

impl ValidatorVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Genesis => "genesis",
            Self::JoinFullBootstrap => "join_full_bootstrap",
            Self::JoinWarmRestart => "join_warm_restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorArg {
    Flag(&'static str),
    Option(&'static str, String),
}

impl ValidatorArg {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flag(name) | Self::Option(name, _) => *name,
        }
    }
}

/// Structured validator command line; serialized only at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorCommand {
    program: String,
    args: Vec<ValidatorArg>,
}

impl ValidatorCommand {
    pub fn args(&self) -> &[ValidatorArg] {
        &self.args
    }

    pub fn flag_count(&self, name: &str) -> usize {
        self.args.iter().filter(|arg| arg.name() == name).count()
    }

    pub fn contains_flag(&self, name: &str) -> bool {
        self.flag_count(name) > 0
    }

    pub fn values_of(&self, name: &str) -> Vec<&str> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                ValidatorArg::Option(flag, value) if *flag == name => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = vec![self.program.clone()];
        for arg in &self.args {
            match arg {
                ValidatorArg::Flag(name) => tokens.push((*name).to_string()),
                ValidatorArg::Option(name, value) => {
                    tokens.push((*name).to_string());
                    tokens.push(value.clone());
                }
            }
        }
        tokens
    }

    /// Space-joined command line in systemd `ExecStart=` syntax. Tokens that
    /// carry blanks or quotes are double-quoted so each stays one argument.
    pub fn render(&self) -> String {
        self.tokens()
            .iter()
            .map(|token| quote_exec_token(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_exec_token(token: &str) -> String {
    if !token
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '"' | '\'' | '\\'))
    {
        return token.to_string();
    }
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for ch in token.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for ValidatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorCommandBuilder {
    program: String,
    args: Vec<ValidatorArg>,
}

impl ValidatorCommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn flag(mut self, name: &'static str) -> Self {
        self.args.push(ValidatorArg::Flag(name));
        self
    }

    pub fn option(mut self, name: &'static str, value: impl ToString) -> Self {
        self.args.push(ValidatorArg::Option(name, value.to_string()));
        self
    }

    pub fn flag_if(self, condition: bool, name: &'static str) -> Self {
        if condition {
            self.flag(name)
        } else {
            self
        }
    }

    pub fn finish(self) -> ValidatorCommand {
        ValidatorCommand {
            program: self.program,
            args: self.args,
        }
    }
}

/// Genesis nodes ignore `first_start`; joining nodes skip the snapshot
/// fetch only once local state exists.
pub fn build_validator_command(state: BootstrapState, config: &DeploymentConfig) -> ValidatorCommand {
    match state.variant() {
        ValidatorVariant::Genesis => build_genesis_command(config),
        ValidatorVariant::JoinFullBootstrap => build_join_command(config, false),
        ValidatorVariant::JoinWarmRestart => build_join_command(config, true),
    }
}

fn base_builder(config: &DeploymentConfig) -> ValidatorCommandBuilder {
    ValidatorCommandBuilder::new(config.toolchain_binary(VALIDATOR_BINARY))
        .option("--identity", config.data_subpath(IDENTITY_KEYPAIR))
        .option("--vote-account", config.data_subpath(VOTE_ACCOUNT_KEYPAIR))
}

fn with_rpc_and_indexes(builder: ValidatorCommandBuilder) -> ValidatorCommandBuilder {
    builder
        .flag("--full-rpc-api")
        .option("--account-index", "program-id")
        .option("--account-index", "spl-token-owner")
        .flag("--incremental-snapshots")
        .option("--account-index", "spl-token-mint")
}

fn build_genesis_command(config: &DeploymentConfig) -> ValidatorCommand {
    let network = &config.network;
    let builder = base_builder(config)
        .flag(NO_GENESIS_FETCH_FLAG)
        .option("--ledger", config.data_subpath(LEDGER_DIR))
        .flag(NO_WAIT_FOR_VOTE_FLAG)
        .option("--tpu-coalesce-ms", network.tpu_coalesce_ms)
        .option("--gossip-port", network.gossip_port)
        .option("--rpc-port", network.rpc_port)
        .flag("--enable-rpc-transaction-history")
        .flag("--enable-cpi-and-log-storage")
        .flag("--require-tower")
        .option("--dynamic-port-range", network.dynamic_port_range);
    with_rpc_and_indexes(builder).finish()
}

fn build_join_command(config: &DeploymentConfig, skip_snapshot_fetch: bool) -> ValidatorCommand {
    let network = &config.network;
    let builder = base_builder(config)
        .option(KNOWN_VALIDATOR_FLAG, &network.known_validator)
        .flag(ONLY_KNOWN_RPC_FLAG)
        .option("--ledger", config.data_subpath(LEDGER_DIR))
        .option("--gossip-port", network.gossip_port)
        .option("--rpc-port", network.rpc_port)
        .flag("--enable-rpc-transaction-history")
        .flag("--enable-cpi-and-log-storage")
        .flag("--require-tower")
        .option("--dynamic-port-range", network.dynamic_port_range)
        .option(ENTRYPOINT_FLAG, &network.entrypoint)
        .option(EXPECTED_GENESIS_HASH_FLAG, &network.expected_genesis_hash);
    with_rpc_and_indexes(builder)
        .flag_if(skip_snapshot_fetch, NO_SNAPSHOT_FETCH_FLAG)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::{
        build_validator_command, ValidatorArg, ValidatorVariant, ENTRYPOINT_FLAG,
        EXPECTED_GENESIS_HASH_FLAG, KNOWN_VALIDATOR_FLAG, NO_GENESIS_FETCH_FLAG,
        NO_SNAPSHOT_FETCH_FLAG, NO_WAIT_FOR_VOTE_FLAG, ONLY_KNOWN_RPC_FLAG,
    };
    use crate::bootstrap_state::BootstrapState;
    use crate::deployment_config::DeploymentConfig;

    fn state(is_genesis: bool, first_start: bool) -> BootstrapState {
        BootstrapState {
            first_start,
            is_genesis,
        }
    }

    fn config() -> DeploymentConfig {
        DeploymentConfig::for_host("54.85.162.144")
    }

    #[test]
    fn regression_render_keeps_blank_containing_paths_as_single_arguments() {
        let mut config = config();
        config.data_path = "/mnt/my data".to_string();
        let rendered = build_validator_command(state(false, false), &config).render();
        assert!(rendered.contains("--identity \"/mnt/my data/keypairs/validator-keypair.json\""));
        assert!(rendered.contains("--ledger \"/mnt/my data/ledger\""));
        assert!(rendered.ends_with(" --no-snapshot-fetch"));
    }

    #[test]
    fn unit_genesis_variant_never_skips_snapshot_or_restricts_entrypoint() {
        for first_start in [true, false] {
            let command = build_validator_command(state(true, first_start), &config());
            assert!(!command.contains_flag(NO_SNAPSHOT_FETCH_FLAG));
            assert!(!command.contains_flag(ENTRYPOINT_FLAG));
            assert!(!command.contains_flag(KNOWN_VALIDATOR_FLAG));
            assert!(!command.contains_flag(ONLY_KNOWN_RPC_FLAG));
            assert!(!command.contains_flag(EXPECTED_GENESIS_HASH_FLAG));
            assert!(command.contains_flag(NO_GENESIS_FETCH_FLAG));
            assert!(command.contains_flag(NO_WAIT_FOR_VOTE_FLAG));
            assert_eq!(command.values_of("--tpu-coalesce-ms"), vec!["50"]);
            assert_eq!(command.values_of("--dynamic-port-range"), vec!["8000-8020"]);
        }
    }

    #[test]
    fn unit_join_first_start_includes_trust_anchors_without_snapshot_skip() {
        let command = build_validator_command(state(false, true), &config());
        assert!(!command.contains_flag(NO_SNAPSHOT_FETCH_FLAG));
        assert_eq!(
            command.values_of(KNOWN_VALIDATOR_FLAG),
            vec!["HBXxbWBy6JRhvT61r4QxFg1FBQdMxeAbcv3q12XWH3xd"]
        );
        assert_eq!(command.values_of(ENTRYPOINT_FLAG), vec!["34.228.109.119:8001"]);
        assert_eq!(
            command.values_of(EXPECTED_GENESIS_HASH_FLAG),
            vec!["6bWMx8nFapGtRQdc5r1Dw5UimiX7YkJLKi6E4VC4LsHS"]
        );
        assert!(!command.contains_flag(NO_GENESIS_FETCH_FLAG));
    }

    #[test]
    fn unit_warm_restart_appends_exactly_one_snapshot_skip_flag() {
        let first = build_validator_command(state(false, true), &config());
        let restart = build_validator_command(state(false, false), &config());
        assert_eq!(restart.flag_count(NO_SNAPSHOT_FETCH_FLAG), 1);
        let (last, prefix) = restart.args().split_last().expect("args");
        assert_eq!(*last, ValidatorArg::Flag(NO_SNAPSHOT_FETCH_FLAG));
        assert_eq!(prefix, first.args());
        assert_eq!(
            restart.render(),
            format!("{} {NO_SNAPSHOT_FETCH_FLAG}", first.render())
        );
    }

    #[test]
    fn unit_join_variants_share_common_operational_flags() {
        for first_start in [true, false] {
            let command = build_validator_command(state(false, first_start), &config());
            assert_eq!(
                command.values_of("--identity"),
                vec!["/home/ubuntu/renec-cluster/keypairs/validator-keypair.json"]
            );
            assert_eq!(
                command.values_of("--vote-account"),
                vec!["/home/ubuntu/renec-cluster/keypairs/validator-vote-account.json"]
            );
            assert_eq!(
                command.values_of("--ledger"),
                vec!["/home/ubuntu/renec-cluster/ledger"]
            );
            assert_eq!(command.values_of("--gossip-port"), vec!["8001"]);
            assert_eq!(command.values_of("--rpc-port"), vec!["8888"]);
            for flag in [
                "--full-rpc-api",
                "--enable-rpc-transaction-history",
                "--enable-cpi-and-log-storage",
                "--require-tower",
                "--incremental-snapshots",
            ] {
                assert_eq!(command.flag_count(flag), 1, "{flag}");
            }
            assert_eq!(
                command.values_of("--account-index"),
                vec!["program-id", "spl-token-owner", "spl-token-mint"]
            );
        }
    }

    #[test]
    fn functional_rendered_join_command_matches_expected_line() {
        let command = build_validator_command(state(false, true), &config());
        assert_eq!(
            command.render(),
            "/home/ubuntu/.local/share/renec/install/active_release/bin/renec-validator \
--identity /home/ubuntu/renec-cluster/keypairs/validator-keypair.json \
--vote-account /home/ubuntu/renec-cluster/keypairs/validator-vote-account.json \
--known-validator HBXxbWBy6JRhvT61r4QxFg1FBQdMxeAbcv3q12XWH3xd \
--only-known-rpc \
--ledger /home/ubuntu/renec-cluster/ledger \
--gossip-port 8001 \
--rpc-port 8888 \
--enable-rpc-transaction-history \
--enable-cpi-and-log-storage \
--require-tower \
--dynamic-port-range 8000-8020 \
--entrypoint 34.228.109.119:8001 \
--expected-genesis-hash 6bWMx8nFapGtRQdc5r1Dw5UimiX7YkJLKi6E4VC4LsHS \
--full-rpc-api \
--account-index program-id \
--account-index spl-token-owner \
--incremental-snapshots \
--account-index spl-token-mint"
        );
    }

    #[test]
    fn regression_custom_network_parameters_flow_into_command() {
        let mut config = config();
        config.network.entrypoint = "10.1.2.3:9001".to_string();
        config.network.gossip_port = 9001;
        config.data_path = "/mnt/validator".to_string();
        let command = build_validator_command(state(false, false), &config);
        assert_eq!(command.values_of(ENTRYPOINT_FLAG), vec!["10.1.2.3:9001"]);
        assert_eq!(command.values_of("--gossip-port"), vec!["9001"]);
        assert_eq!(command.values_of("--ledger"), vec!["/mnt/validator/ledger"]);
        assert!(command.contains_flag(NO_SNAPSHOT_FETCH_FLAG));
        assert_eq!(state(false, false).variant(), ValidatorVariant::JoinWarmRestart);
    }
}
