use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Privilege level a remote command runs with.
pub enum Privilege {
    User,
    Superuser,
}

/// One command issued to a remote host, kept as argv until it is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCommand {
    pub privilege: Privilege,
    pub argv: Vec<String>,
}

impl RemoteCommand {
    pub fn user<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            privilege: Privilege::User,
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sudo<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            privilege: Privilege::Superuser,
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Runs `script` through `bash -c` as the login user. Used for pipelines,
    /// redirections and command substitution.
    pub fn user_shell(script: impl Into<String>) -> Self {
        Self::user(["bash".to_string(), "-c".to_string(), script.into()])
    }

    /// Runs `script` through `bash -c` under `sudo`, so redirections into
    /// root-owned files happen with elevated privilege.
    pub fn sudo_shell(script: impl Into<String>) -> Self {
        Self::sudo(["bash".to_string(), "-c".to_string(), script.into()])
    }

    pub fn is_privileged(&self) -> bool {
        self.privilege == Privilege::Superuser
    }

    /// Quoted shell line as it is sent to the remote login shell.
    pub fn render(&self) -> String {
        let line = shell_words::join(&self.argv);
        match self.privilege {
            Privilege::User => line,
            Privilege::Superuser => format!("sudo {line}"),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Captured result of a remote command. A non-zero status is not an error at
/// this level; callers decide what a status means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            status: Some(0),
            ..Self::default()
        }
    }

    pub fn with_status(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    pub fn describe_status(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "termination by signal".to_string(),
        }
    }
}
