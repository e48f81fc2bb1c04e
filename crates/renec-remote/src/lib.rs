//! Remote host capabilities used by the renec provisioning flow.
//!
//! Exposes the probe/executor traits the deployment crate is written against,
//! an OpenSSH subprocess transport, and an in-memory host for tests and local
//! experimentation.

pub mod in_memory_host;
pub mod remote_command;
pub mod remote_host;
pub mod ssh_remote_host;

pub use in_memory_host::{InMemoryRemoteHost, UploadRecord};
pub use remote_command::{CommandOutput, Privilege, RemoteCommand};
pub use remote_host::{probe_directory, ProbeError, RemoteError, RemoteExecutor, RemoteProbe};
pub use ssh_remote_host::{SshRemoteHost, SshTarget};
