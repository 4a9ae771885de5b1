use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// The external publish operation. The engine never renders or uploads
/// documents itself; it hands the tree root to a publisher and parses the
/// textual result. The trait exists so the orchestrator can be exercised
/// without spawning a process.
pub trait Publisher {
    /// Run one publish pass from `tree_root` and return the complete
    /// captured standard output. Implementations must not return partial
    /// output.
    fn publish(&self, tree_root: &Path) -> Result<String>;
}

/// Production publisher: spawns the configured command with the tree root as
/// working directory, so the command picks up `confsync.toml` (and the
/// mirror-repointed `publish_root`) on its own. Credentials resolved from
/// environment or configuration are handed to the subprocess via its
/// environment, never written to disk.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    command_line: String,
    username: Option<String>,
    api_token: Option<String>,
}

impl CommandPublisher {
    pub fn new(command_line: &str) -> Self {
        Self {
            command_line: command_line.to_string(),
            username: None,
            api_token: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, api_token: Option<String>) -> Self {
        self.username = username;
        self.api_token = api_token;
        self
    }
}

impl Publisher for CommandPublisher {
    fn publish(&self, tree_root: &Path) -> Result<String> {
        let mut parts = self.command_line.split_whitespace();
        let Some(program) = parts.next() else {
            bail!("publish command is empty");
        };
        let mut command = Command::new(program);
        command.args(parts).current_dir(tree_root);
        if let Some(username) = &self.username {
            command.env("CONFSYNC_USERNAME", username);
        }
        if let Some(token) = &self.api_token {
            command.env("CONFSYNC_API_TOKEN", token);
        }
        let output = command
            .output()
            .with_context(|| format!("failed to run publish command `{}`", self.command_line))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            bail!(
                "publish command `{}` failed ({})\nstdout:\n{stdout}\nstderr:\n{stderr}",
                self.command_line,
                output.status
            );
        }
        Ok(stdout)
    }
}
