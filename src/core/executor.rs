//! Command execution against the target host and the controlling host.
//!
//! Remote commands run through a [`RemoteShell`]; local ones through a
//! [`LocalShell`]. Both are traits so the pipeline can be driven against
//! scripted fakes. A [`RemoteSession`] adds a directory stack: entering a
//! directory with [`RemoteSession::cd`] returns a guard that restores the
//! previous directory when dropped, whichever way the scope is left.

use std::cell::{Cell, RefCell};
use std::path::Path;

use crate::error::{CommandFailedDetails, Error, Result, TargetDetails};
use crate::ssh::{execute_local_command_in_dir, CommandOutput, SshClient};
use crate::utils::base_path::resolve_dir_stack;
use crate::utils::shell;

pub trait RemoteShell {
    /// Host identity, used in diagnostics.
    fn host(&self) -> &str;
    fn execute(&self, command: &str) -> CommandOutput;
    fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput;
}

pub trait LocalShell {
    fn execute(&self, command: &str, current_dir: Option<&Path>) -> CommandOutput;
}

impl RemoteShell for SshClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, command: &str) -> CommandOutput {
        SshClient::execute(self, command)
    }

    fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        SshClient::upload_file(self, local_path, remote_path)
    }
}

/// Runs local commands through `sh -c`.
pub struct SystemShell;

impl LocalShell for SystemShell {
    fn execute(&self, command: &str, current_dir: Option<&Path>) -> CommandOutput {
        execute_local_command_in_dir(command, current_dir)
    }
}

/// Prefix `command` with a `cd` into `working_dir`.
pub fn scoped_command(command: &str, working_dir: Option<&str>) -> String {
    match working_dir {
        Some(dir) => format!("cd {} && {}", shell::quote_path(dir), command),
        None => command.to_string(),
    }
}

/// Run one command on the remote host. Non-zero exit is an error.
pub fn run_remote(
    remote: &dyn RemoteShell,
    command: &str,
    working_dir: Option<&str>,
) -> Result<CommandOutput> {
    let output = remote.execute(&scoped_command(command, working_dir));
    if output.success {
        return Ok(output);
    }

    Err(Error::remote_command_failed(CommandFailedDetails {
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        target: TargetDetails {
            host: Some(remote.host().to_string()),
            working_dir: working_dir.map(str::to_string),
        },
    }))
}

/// Run one command on the controlling host. Non-zero exit is an error.
pub fn run_local(
    local: &dyn LocalShell,
    command: &str,
    current_dir: Option<&Path>,
) -> Result<CommandOutput> {
    log_status!("local", "{}", command);
    let output = local.execute(command, current_dir);
    if output.success {
        return Ok(output);
    }

    Err(Error::local_command_failed(CommandFailedDetails {
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        target: TargetDetails {
            host: None,
            working_dir: current_dir.map(|d| d.display().to_string()),
        },
    }))
}

/// Remote execution with a scoped working directory.
pub struct RemoteSession<'a> {
    remote: &'a dyn RemoteShell,
    dirs: RefCell<Vec<String>>,
    issued: Cell<usize>,
}

/// Restores the session's previous working directory on drop.
#[must_use = "the directory is left as soon as the scope guard is dropped"]
pub struct DirScope<'s> {
    dirs: &'s RefCell<Vec<String>>,
    depth: usize,
}

impl Drop for DirScope<'_> {
    fn drop(&mut self) {
        self.dirs.borrow_mut().truncate(self.depth);
    }
}

impl<'a> RemoteSession<'a> {
    pub fn new(remote: &'a dyn RemoteShell) -> Self {
        Self {
            remote,
            dirs: RefCell::new(Vec::new()),
            issued: Cell::new(0),
        }
    }

    pub fn host(&self) -> &str {
        self.remote.host()
    }

    /// Enter `dir`, relative to the current directory unless absolute.
    pub fn cd(&self, dir: &str) -> DirScope<'_> {
        let mut dirs = self.dirs.borrow_mut();
        let depth = dirs.len();
        dirs.push(dir.to_string());
        DirScope {
            dirs: &self.dirs,
            depth,
        }
    }

    /// Run `f` with `dir` entered.
    pub fn within<T>(&self, dir: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _scope = self.cd(dir);
        f()
    }

    pub fn cwd(&self) -> Option<String> {
        resolve_dir_stack(&self.dirs.borrow())
    }

    /// Run a command in the current directory; non-zero exit is an error.
    pub fn run(&self, command: &str) -> Result<CommandOutput> {
        let cwd = self.cwd();
        match cwd.as_deref() {
            Some(dir) => log_status!("remote", "[{}] {}", dir, command),
            None => log_status!("remote", "{}", command),
        }
        self.issued.set(self.issued.get() + 1);
        run_remote(self.remote, command, cwd.as_deref())
    }

    /// Run a command whose exit status the caller interprets.
    pub fn probe(&self, command: &str) -> CommandOutput {
        self.issued.set(self.issued.get() + 1);
        self.remote
            .execute(&scoped_command(command, self.cwd().as_deref()))
    }

    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        self.issued.set(self.issued.get() + 1);
        self.remote.upload_file(local_path, remote_path)
    }

    /// Remote commands and uploads issued so far.
    pub fn issued(&self) -> usize {
        self.issued.get()
    }
}
