use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::remote_command::{CommandOutput, RemoteCommand};
use crate::remote_host::{probe_directory, ProbeError, RemoteError, RemoteExecutor, RemoteProbe};

/// File written through [`RemoteExecutor::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub destination: String,
    pub content: String,
}

#[derive(Debug, Clone)]
struct SideEffect {
    fragment: String,
    creates_directory: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    fragment: String,
    status: i32,
}

#[derive(Debug, Default)]
struct HostInner {
    directories: BTreeSet<String>,
    files: BTreeMap<String, String>,
    executed: Vec<RemoteCommand>,
    uploads: Vec<UploadRecord>,
    side_effects: Vec<SideEffect>,
    failures: Vec<InjectedFailure>,
}

/// In-memory host for tests and local experimentation.
///
/// Understands the handful of commands whose results feed back into later
/// decisions (`test -d`, `mkdir -p`, `grep -qxF`, `sed -i '1 i\...'`, `cp`);
/// everything else is recorded and succeeds unless a failure was injected.
#[derive(Debug)]
pub struct InMemoryRemoteHost {
    host: String,
    inner: Mutex<HostInner>,
}

impl InMemoryRemoteHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            inner: Mutex::new(HostInner::default()),
        }
    }

    pub fn with_directory(mut self, path: &str) -> Self {
        self.inner.get_mut().directories.insert(normalize_path(path));
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.inner
            .get_mut()
            .files
            .insert(normalize_path(path), content.to_string());
        self
    }

    /// Any command whose rendered line contains `fragment` creates `path`.
    pub fn with_side_effect(mut self, fragment: &str, creates_directory: &str) -> Self {
        self.inner.get_mut().side_effects.push(SideEffect {
            fragment: fragment.to_string(),
            creates_directory: normalize_path(creates_directory),
        });
        self
    }

    pub async fn fail_on(&self, fragment: &str) {
        self.fail_on_with_status(fragment, 1).await;
    }

    pub async fn fail_on_with_status(&self, fragment: &str, status: i32) {
        self.inner.lock().await.failures.push(InjectedFailure {
            fragment: fragment.to_string(),
            status,
        });
    }

    pub async fn has_directory(&self, path: &str) -> bool {
        self.inner
            .lock()
            .await
            .directories
            .contains(&normalize_path(path))
    }

    pub async fn file(&self, path: &str) -> Option<String> {
        self.inner.lock().await.files.get(&normalize_path(path)).cloned()
    }

    pub async fn executed(&self) -> Vec<RemoteCommand> {
        self.inner.lock().await.executed.clone()
    }

    /// Rendered lines of every executed command, probes included.
    pub async fn executed_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .executed
            .iter()
            .map(RemoteCommand::render)
            .collect()
    }

    /// Rendered lines of executed commands that are not read-only probes.
    pub async fn mutating_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .executed
            .iter()
            .filter(|command| !is_read_only(command))
            .map(RemoteCommand::render)
            .collect()
    }

    pub async fn uploads(&self) -> Vec<UploadRecord> {
        self.inner.lock().await.uploads.clone()
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_read_only(command: &RemoteCommand) -> bool {
    matches!(
        command.argv.first().map(String::as_str),
        Some("test") | Some("grep")
    )
}

fn parent_directory(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

impl HostInner {
    fn simulate(&mut self, command: &RemoteCommand) -> CommandOutput {
        let argv: Vec<&str> = command.argv.iter().map(String::as_str).collect();
        match argv.as_slice() {
            ["test", "-d", path] => {
                if self.directories.contains(&normalize_path(path)) {
                    CommandOutput::success()
                } else {
                    CommandOutput::with_status(1, "")
                }
            }
            ["test", "-s", path] => match self.files.get(&normalize_path(path)) {
                Some(content) if !content.is_empty() => CommandOutput::success(),
                _ => CommandOutput::with_status(1, ""),
            },
            ["mkdir", "-p", path] => {
                self.directories.insert(normalize_path(path));
                CommandOutput::success()
            }
            ["grep", "-qxF", line, path] => match self.files.get(&normalize_path(path)) {
                None => CommandOutput::with_status(2, format!("grep: {path}: No such file")),
                Some(content) if content.lines().any(|existing| existing == *line) => {
                    CommandOutput::success()
                }
                Some(_) => CommandOutput::with_status(1, ""),
            },
            ["sed", "-i", expression, path] => {
                let Some(inserted) = expression.strip_prefix("1 i\\") else {
                    return CommandOutput::success();
                };
                match self.files.get_mut(&normalize_path(path)) {
                    // GNU sed has no line 1 to insert before in an empty file.
                    Some(content) if content.is_empty() => CommandOutput::success(),
                    Some(content) => {
                        *content = format!("{inserted}\n{content}");
                        CommandOutput::success()
                    }
                    None => CommandOutput::with_status(
                        2,
                        format!("sed: can't read {path}: No such file or directory"),
                    ),
                }
            }
            ["cp", source, destination_dir] => {
                let Some(content) = self.files.get(&normalize_path(source)).cloned() else {
                    return CommandOutput::with_status(
                        1,
                        format!("cp: cannot stat '{source}': No such file or directory"),
                    );
                };
                let destination = format!("{}/{}", normalize_path(destination_dir), file_name(source));
                self.files.insert(destination, content);
                CommandOutput::success()
            }
            _ => CommandOutput::success(),
        }
    }
}

#[async_trait]
impl RemoteProbe for InMemoryRemoteHost {
    async fn path_exists(&self, path: &str) -> Result<bool, ProbeError> {
        probe_directory(self, path).await
    }
}

#[async_trait]
impl RemoteExecutor for InMemoryRemoteHost {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        let rendered = command.render();
        let mut inner = self.inner.lock().await;
        inner.executed.push(command.clone());

        if let Some(failure) = inner
            .failures
            .iter()
            .find(|failure| rendered.contains(&failure.fragment))
        {
            return Ok(CommandOutput::with_status(
                failure.status,
                format!("injected failure for '{}'", failure.fragment),
            ));
        }

        let output = inner.simulate(command);
        if output.succeeded() {
            let created: Vec<String> = inner
                .side_effects
                .iter()
                .filter(|effect| rendered.contains(&effect.fragment))
                .map(|effect| effect.creates_directory.clone())
                .collect();
            inner.directories.extend(created);
        }
        Ok(output)
    }

    async fn upload(&self, content: &[u8], destination: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        if let Some(failure) = inner
            .failures
            .iter()
            .find(|failure| destination.contains(&failure.fragment))
        {
            return Err(RemoteError::CommandFailed {
                command: format!("cat > {destination}"),
                status: format!("exit status {}", failure.status),
                stderr: format!("injected failure for '{}'", failure.fragment),
            });
        }
        let destination = normalize_path(destination);
        let overwrites_file = inner.files.contains_key(&destination);
        if let Some(parent) = parent_directory(&destination) {
            if !overwrites_file && !parent.is_empty() && !inner.directories.contains(parent) {
                return Err(RemoteError::CommandFailed {
                    command: format!("cat > {destination}"),
                    status: "exit status 1".to_string(),
                    stderr: format!("sh: {destination}: No such file or directory"),
                });
            }
        }
        let content = String::from_utf8_lossy(content).into_owned();
        inner.files.insert(destination.clone(), content.clone());
        inner.uploads.push(UploadRecord {
            destination,
            content,
        });
        Ok(())
    }
}
