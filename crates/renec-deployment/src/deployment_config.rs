use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

pub const DEFAULT_SSH_USER: &str = "ubuntu";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_RENEC_VERSION: &str = "1.9.29";
pub const DEFAULT_DATA_PATH: &str = "/home/ubuntu/renec-cluster";
pub const DEFAULT_ENTRYPOINT: &str = "34.228.109.119:8001";
pub const DEFAULT_EXPECTED_GENESIS_HASH: &str = "6bWMx8nFapGtRQdc5r1Dw5UimiX7YkJLKi6E4VC4LsHS";
pub const DEFAULT_KNOWN_VALIDATOR: &str = "HBXxbWBy6JRhvT61r4QxFg1FBQdMxeAbcv3q12XWH3xd";
pub const DEFAULT_GOSSIP_PORT: u16 = 8001;
pub const DEFAULT_RPC_PORT: u16 = 8888;
pub const DEFAULT_DYNAMIC_PORT_RANGE: PortRange = PortRange {
    start: 8000,
    end: 8020,
};
pub const DEFAULT_TPU_COALESCE_MS: u64 = 50;
pub const DEFAULT_SYSTEM_INFO_COMMAND: &str = "/usr/local/bin/node_exporter";

pub const RAID_LABEL: &str = "renec_raid";
pub const RAID_ARRAY_DEVICE: &str = "/dev/md0";
pub const RAID_DEVICES: [&str; 4] = ["/dev/nvme1n1", "/dev/nvme2n1", "/dev/nvme3n1", "/dev/nvme4n1"];

const TOOLCHAIN_RELATIVE_BIN_DIR: &str = ".local/share/renec/install/active_release/bin";
const SOFTWARE_RELATIVE_CONFIG_DIR: &str = ".config/renec";
const SHELL_STARTUP_FILE: &str = ".bashrc";
const DEFAULT_STAGING_DIR_NAME: &str = "renec-deploy";

/// Inclusive port range rendered as `start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some((start, end)) = raw.trim().split_once('-') else {
            return Err(format!("port range '{raw}' must use the form <start>-<end>"));
        };
        let start = start
            .trim()
            .parse::<u16>()
            .map_err(|error| format!("invalid port range start '{start}': {error}"))?;
        let end = end
            .trim()
            .parse::<u16>()
            .map_err(|error| format!("invalid port range end '{end}': {error}"))?;
        if start == 0 || start >= end {
            return Err(format!(
                "port range '{raw}' must satisfy 0 < start < end"
            ));
        }
        Ok(Self { start, end })
    }
}

/// Network-facing validator parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkParameters {
    pub entrypoint: String,
    pub expected_genesis_hash: String,
    pub known_validator: String,
    pub gossip_port: u16,
    pub rpc_port: u16,
    pub dynamic_port_range: PortRange,
    pub tpu_coalesce_ms: u64,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            expected_genesis_hash: DEFAULT_EXPECTED_GENESIS_HASH.to_string(),
            known_validator: DEFAULT_KNOWN_VALIDATOR.to_string(),
            gossip_port: DEFAULT_GOSSIP_PORT,
            rpc_port: DEFAULT_RPC_PORT,
            dynamic_port_range: DEFAULT_DYNAMIC_PORT_RANGE,
            tpu_coalesce_ms: DEFAULT_TPU_COALESCE_MS,
        }
    }
}

/// Immutable parameters for one deployment run against one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentConfig {
    pub host: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_keys: Vec<PathBuf>,
    pub forward_agent: bool,
    pub renec_version: String,
    pub data_path: String,
    pub is_genesis: bool,
    pub network: NetworkParameters,
    pub staging_dir: String,
    pub unit_template_dir: Option<PathBuf>,
    pub system_info_command: String,
}

impl DeploymentConfig {
    /// Configuration for `host` with every other field at its default.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ssh_user: DEFAULT_SSH_USER.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_keys: Vec::new(),
            forward_agent: true,
            renec_version: DEFAULT_RENEC_VERSION.to_string(),
            data_path: DEFAULT_DATA_PATH.to_string(),
            is_genesis: false,
            network: NetworkParameters::default(),
            staging_dir: default_staging_dir(DEFAULT_SSH_USER),
            unit_template_dir: None,
            system_info_command: DEFAULT_SYSTEM_INFO_COMMAND.to_string(),
        }
    }

    pub fn remote_home(&self) -> String {
        remote_home_for(&self.ssh_user)
    }

    pub fn toolchain_bin_dir(&self) -> String {
        format!("{}/{TOOLCHAIN_RELATIVE_BIN_DIR}", self.remote_home())
    }

    pub fn software_config_dir(&self) -> String {
        format!("{}/{SOFTWARE_RELATIVE_CONFIG_DIR}", self.remote_home())
    }

    pub fn shell_startup_file(&self) -> String {
        format!("{}/{SHELL_STARTUP_FILE}", self.remote_home())
    }

    pub fn snapshot_dir(&self) -> String {
        format!("{}/snapshot/", self.data_path.trim_end_matches('/'))
    }

    pub fn data_subpath(&self, relative: &str) -> String {
        format!("{}/{relative}", self.data_path.trim_end_matches('/'))
    }

    pub fn toolchain_binary(&self, name: &str) -> String {
        format!("{}/{name}", self.toolchain_bin_dir())
    }
}

pub fn remote_home_for(user: &str) -> String {
    format!("/home/{user}")
}

pub fn default_staging_dir(user: &str) -> String {
    format!("{}/{DEFAULT_STAGING_DIR_NAME}", remote_home_for(user))
}

/// Raw block devices aggregated into the data volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSpec {
    pub devices: Vec<String>,
    pub label: String,
    pub array_device: String,
    pub mount_path: String,
    pub owner: String,
}

impl StorageSpec {
    /// The fixed four-disk striped array used by renec validator hosts.
    pub fn renec_raid(config: &DeploymentConfig) -> Self {
        Self {
            devices: RAID_DEVICES.iter().map(ToString::to_string).collect(),
            label: RAID_LABEL.to_string(),
            array_device: RAID_ARRAY_DEVICE.to_string(),
            mount_path: config.data_path.clone(),
            owner: config.ssh_user.clone(),
        }
    }

    /// Striping only; no parity.
    pub fn raid_level(&self) -> u8 {
        0
    }

    pub fn fstab_entry(&self) -> FstabEntry {
        FstabEntry {
            source: format!("LABEL={}", self.label),
            target: self.mount_path.clone(),
            fstype: "ext4".to_string(),
            options: "defaults,nofail".to_string(),
            dump: 0,
            pass: 2,
        }
    }
}

/// One line of `/etc/fstab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
    pub options: String,
    pub dump: u8,
    pub pass: u8,
}

impl fmt::Display for FstabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            escape_fstab_field(&self.source),
            escape_fstab_field(&self.target),
            self.fstype,
            self.options,
            self.dump,
            self.pass
        )
    }
}

/// fstab splits fields on blanks; embedded ones use octal escapes.
fn escape_fstab_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            ' ' => escaped.push_str("\\040"),
            '\t' => escaped.push_str("\\011"),
            '\n' => escaped.push_str("\\012"),
            '\\' => escaped.push_str("\\134"),
            other => escaped.push(other),
        }
    }
    escaped
}
