use renec_remote::{ProbeError, RemoteProbe};
use serde::Serialize;

use crate::deployment_config::DeploymentConfig;
use crate::validator_command::ValidatorVariant;

/// Startup situation of the validator for one deployment run. Recomputed on
/// every run; only meaningful once the data volume is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BootstrapState {
    pub first_start: bool,
    pub is_genesis: bool,
}

impl BootstrapState {
    pub fn variant(self) -> ValidatorVariant {
        match (self.is_genesis, self.first_start) {
            (true, _) => ValidatorVariant::Genesis,
            (false, true) => ValidatorVariant::JoinFullBootstrap,
            (false, false) => ValidatorVariant::JoinWarmRestart,
        }
    }
}

pub struct BootstrapStateResolver<'a> {
    probe: &'a dyn RemoteProbe,
}

impl<'a> BootstrapStateResolver<'a> {
    pub fn new(probe: &'a dyn RemoteProbe) -> Self {
        Self { probe }
    }

    /// `first_start` holds until the validator has written a snapshot
    /// directory under the data path.
    #[tracing::instrument(level = "debug", skip_all, fields(data_path = %config.data_path))]
    pub async fn resolve(&self, config: &DeploymentConfig) -> Result<BootstrapState, ProbeError> {
        let snapshot_dir = config.snapshot_dir();
        let has_snapshot = self.probe.path_exists(&snapshot_dir).await?;
        let state = BootstrapState {
            first_start: !has_snapshot,
            is_genesis: config.is_genesis,
        };
        tracing::info!(
            first_start = state.first_start,
            is_genesis = state.is_genesis,
            variant = state.variant().as_str(),
            "resolved bootstrap state"
        );
        Ok(state)
    }
}
