use crate::config::HostConfig;
use crate::error::{Error, Result};
use crate::utils::shell;
use std::path::Path;
use std::process::Command;

pub struct SshClient {
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

impl SshClient {
    pub fn from_host(host: &HostConfig) -> Result<Self> {
        let identity_file = match &host.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        host.alias.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&host.alias);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", host.alias);
        }

        Ok(Self {
            host: host.alias.clone(),
            user: host.user.clone().filter(|u| !u.is_empty()),
            port: host.port,
            identity_file,
            is_local,
        })
    }

    /// `user@host` when a user is configured, otherwise the bare host so
    /// ~/.ssh/config can supply it.
    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never block on prompts; give up on stalled connections.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(self.destination());
        args.push(command.to_string());

        args
    }

    /// Run `command` once. A failed command is reported as is, never rerun.
    pub fn execute(&self, command: &str) -> CommandOutput {
        self.execute_once(command, None)
    }

    /// Stream `local_path` into `remote_path` in a single attempt.
    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        let remote_command = format!("cat > {}", shell::quote_path(remote_path));
        self.execute_once(&remote_command, Some(local_path))
    }

    fn execute_once(&self, command: &str, stdin_file: Option<&Path>) -> CommandOutput {
        if self.is_local {
            if let Some(stdin_file_path) = stdin_file {
                let local_cmd = format!(
                    "cat {} | {}",
                    shell::quote_path(&stdin_file_path.to_string_lossy()),
                    command
                );
                return execute_local_command_in_dir(&local_cmd, None);
            }
            return execute_local_command_in_dir(command, None);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));

        if let Some(stdin_file_path) = stdin_file {
            match std::fs::File::open(stdin_file_path) {
                Ok(file) => {
                    cmd.stdin(file);
                }
                Err(err) => {
                    return CommandOutput::failed(
                        -1,
                        format!("Failed to open stdin file: {}", err),
                    );
                }
            }
        }

        match cmd.output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(-1, format!("SSH error: {}", e)),
        }
    }
}

pub fn execute_local_command_in_dir(command: &str, current_dir: Option<&Path>) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(user: Option<&str>, port: u16) -> SshClient {
        SshClient {
            host: "raspberry_dev_local".to_string(),
            user: user.map(str::to_string),
            port,
            identity_file: None,
            is_local: false,
        }
    }

    #[test]
    fn alias_without_user_is_passed_bare() {
        let args = client(None, 22).build_ssh_args("uname -a");
        assert_eq!(args[args.len() - 2], "raspberry_dev_local");
        assert_eq!(args.last().unwrap(), "uname -a");
        assert!(!args.contains(&"-p".to_string()));
    }

    #[test]
    fn user_and_port_are_applied() {
        let args = client(Some("pi"), 2222).build_ssh_args("true");
        assert!(args.contains(&"pi@raspberry_dev_local".to_string()));
        let port_idx = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[port_idx + 1], "2222");
        assert!(args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let host = HostConfig {
            identity_file: Some("/nonexistent/id_rsa".to_string()),
            ..HostConfig::default()
        };
        let err = SshClient::from_host(&host).err().unwrap();
        assert_eq!(err.code.as_str(), "ssh.identity_file_not_found");
    }

    #[test]
    fn localhost_runs_locally() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("::1"));
        assert!(!is_local_host("raspberry_dev_local"));
    }

    fn local_client() -> SshClient {
        SshClient {
            is_local: true,
            ..client(None, 22)
        }
    }

    #[test]
    fn failed_command_runs_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");
        let command = format!(
            "echo run >> {}; echo 'Connection refused' >&2; exit 1",
            shell::quote_path(&runs.to_string_lossy())
        );

        let out = local_client().execute(&command);

        assert!(!out.success);
        let contents = std::fs::read_to_string(&runs).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn exit_255_from_the_command_is_not_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");
        let command = format!(
            "echo run >> {}; echo 'ssh: Could not resolve hostname x' >&2; exit 255",
            shell::quote_path(&runs.to_string_lossy())
        );

        let out = local_client().execute(&command);

        assert_eq!(out.exit_code, 255);
        let contents = std::fs::read_to_string(&runs).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn local_upload_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("payload");
        std::fs::write(&source, "data").unwrap();
        let target = dir.path().join("missing").join("payload");

        let out = local_client().upload_file(&source, &target.to_string_lossy());

        assert!(!out.success);
        assert!(!target.exists());
    }

    #[test]
    fn local_command_captures_output_and_status() {
        let out = execute_local_command_in_dir("echo hello", None);
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");

        let out = execute_local_command_in_dir("exit 3", None);
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn error_text_prefers_stderr() {
        let out = CommandOutput {
            stdout: "stdout content".to_string(),
            stderr: "stderr content".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(out.error_text(), "stderr content");
        assert_eq!(CommandOutput::failed(1, "").error_text(), "");
    }
}
