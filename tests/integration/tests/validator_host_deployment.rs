use renec_deployment::{
    DeploymentConfig, ProvisioningOrchestrator, StepOutcome, UnitTemplates, ValidatorVariant,
};
use renec_remote::{InMemoryRemoteHost, RemoteCommand, RemoteExecutor};

const HOST: &str = "54.85.162.144";
const DATA_PATH: &str = "/home/ubuntu/renec-cluster";
const BASHRC: &str = "/home/ubuntu/.bashrc";
const CONFIG_DIR: &str = "/home/ubuntu/.config/renec";
const VALIDATOR_UNIT: &str = "/etc/systemd/system/renec.service";
const KNOWN_VALIDATOR: &str = "HBXxbWBy6JRhvT61r4QxFg1FBQdMxeAbcv3q12XWH3xd";
const PATH_LINE: &str =
    "export PATH=\"/home/ubuntu/.local/share/renec/install/active_release/bin:$PATH\"";

fn fresh_host() -> InMemoryRemoteHost {
    InMemoryRemoteHost::new(HOST)
        .with_file(BASHRC, "# ~/.bashrc: executed by bash(1) for non-login shells.\n")
        .with_side_effect("curl -sSfL", CONFIG_DIR)
}

fn provisioned_host() -> InMemoryRemoteHost {
    InMemoryRemoteHost::new(HOST)
        .with_directory(DATA_PATH)
        .with_directory("/home/ubuntu/renec-cluster/snapshot")
        .with_directory(CONFIG_DIR)
        .with_file(BASHRC, &format!("{PATH_LINE}\n# ~/.bashrc\n"))
}

async fn exec_start(host: &InMemoryRemoteHost) -> String {
    let unit = host.file(VALIDATOR_UNIT).await.expect("validator unit installed");
    unit.lines()
        .find_map(|line| line.strip_prefix("ExecStart="))
        .expect("ExecStart line")
        .to_string()
}

#[tokio::test]
async fn integration_fresh_host_joins_cluster_with_full_bootstrap() {
    let host = fresh_host();
    let config = DeploymentConfig::for_host(HOST);
    let report = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
        .run()
        .await
        .expect("deployment");

    assert_eq!(report.storage, StepOutcome::Applied);
    assert_eq!(report.toolchain, StepOutcome::Applied);
    assert_eq!(report.variant, ValidatorVariant::JoinFullBootstrap);

    let lines = host.mutating_lines().await;
    let create = host
        .executed()
        .await
        .into_iter()
        .find(|command| command.argv.get(1).map(String::as_str) == Some("--create"))
        .expect("array creation");
    assert!(create.is_privileged());
    assert_eq!(create.argv[0], "mdadm");
    for arg in ["--level=0", "--name=renec_raid", "--raid-devices=4"] {
        assert!(create.argv.iter().any(|token| token == arg), "missing {arg}");
    }
    assert_eq!(
        &create.argv[create.argv.len() - 4..],
        ["/dev/nvme1n1", "/dev/nvme2n1", "/dev/nvme3n1", "/dev/nvme4n1"]
    );
    assert!(host.has_directory(DATA_PATH).await);
    assert!(host
        .file(BASHRC)
        .await
        .expect("bashrc")
        .starts_with(PATH_LINE));

    let command = exec_start(&host).await;
    assert!(command.contains(&format!("--known-validator {KNOWN_VALIDATOR}")));
    assert!(command.contains("--entrypoint 34.228.109.119:8001"));
    assert!(!command.contains("--no-snapshot-fetch"));
    assert_eq!(command, report.validator_command);
    assert!(lines.contains(&"sudo systemctl enable renec.service".to_string()));
    assert!(lines.contains(&"sudo systemctl restart renec.service".to_string()));
}

#[tokio::test]
async fn integration_provisioned_host_restarts_without_snapshot_fetch() {
    let host = provisioned_host();
    let config = DeploymentConfig::for_host(HOST);
    let report = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
        .run()
        .await
        .expect("deployment");

    assert_eq!(report.storage, StepOutcome::Skipped);
    assert_eq!(report.toolchain, StepOutcome::Skipped);
    assert_eq!(report.path_entry, StepOutcome::Skipped);
    assert_eq!(report.variant, ValidatorVariant::JoinWarmRestart);

    let lines = host.mutating_lines().await;
    assert!(!lines.iter().any(|line| line.contains("mdadm")));
    assert!(!lines.iter().any(|line| line.contains("mkfs")));
    assert!(!lines.iter().any(|line| line.contains("curl")));
    assert!(!lines.iter().any(|line| line.starts_with("sed")));

    let command = exec_start(&host).await;
    assert!(command.ends_with("--no-snapshot-fetch"));
    assert!(lines.contains(&"sudo systemctl restart renec.service".to_string()));
}

#[tokio::test]
async fn integration_genesis_host_starts_without_cluster_discovery() {
    let host = fresh_host();
    let mut config = DeploymentConfig::for_host(HOST);
    config.is_genesis = true;
    let report = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded())
        .run()
        .await
        .expect("deployment");
    assert_eq!(report.variant, ValidatorVariant::Genesis);

    let command = exec_start(&host).await;
    assert!(command.contains("--no-genesis-fetch"));
    assert!(command.contains("--no-wait-for-vote-to-start-leader"));
    assert!(command.contains("--tpu-coalesce-ms 50"));
    assert!(!command.contains("--known-validator"));
    assert!(!command.contains("--entrypoint"));
    assert!(!command.contains("--expected-genesis-hash"));
}

#[tokio::test]
async fn integration_repeated_deployment_converges() {
    let host = fresh_host();
    let config = DeploymentConfig::for_host(HOST);
    let orchestrator = ProvisioningOrchestrator::new(&host, &config, UnitTemplates::embedded());
    orchestrator.run().await.expect("first deployment");

    // A restarted validator has written its first snapshot by the next run.
    host.run(&RemoteCommand::user([
        "mkdir",
        "-p",
        "/home/ubuntu/renec-cluster/snapshot",
    ]))
    .await
    .expect("snapshot written");
    let second = orchestrator.run().await.expect("second deployment");
    assert_eq!(second.storage, StepOutcome::Skipped);
    assert_eq!(second.variant, ValidatorVariant::JoinWarmRestart);

    let bashrc = host.file(BASHRC).await.expect("bashrc");
    assert_eq!(bashrc.matches(PATH_LINE).count(), 1);
    let creates = host
        .mutating_lines()
        .await
        .into_iter()
        .filter(|line| line.contains("mdadm --create"))
        .count();
    assert_eq!(creates, 1);
}
