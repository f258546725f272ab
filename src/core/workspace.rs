//! The remote workspace: the extracted source tree on the target host.

use serde::Serialize;

use crate::config::{Interpreter, PipelineConfig};
use crate::error::{CommandFailedDetails, Error, Result, TargetDetails};
use crate::executor::{LocalShell, RemoteSession};
use crate::packager::{self, SourceArchive};
use crate::transfer;
use crate::utils::artifact;
use crate::utils::base_path::join_remote_path;
use crate::utils::shell;

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub archive: SourceArchive,
    pub remote_archive: String,
    pub workspace: String,
    pub helper_scripts: Vec<String>,
}

/// Fail fast unless the workspace directory exists on the host.
pub fn ensure_exists(session: &RemoteSession, workspace: &str) -> Result<()> {
    let command = format!("test -d {}", shell::quote_path(workspace));
    let output = session.probe(&command);

    if output.success {
        return Ok(());
    }

    // `test -d` exits 1 for a missing directory; anything else is the
    // transport or the shell failing.
    if output.exit_code == 1 {
        return Err(Error::workspace_not_found(workspace, session.host()));
    }

    Err(Error::remote_command_failed(CommandFailedDetails {
        command,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        target: TargetDetails {
            host: Some(session.host().to_string()),
            working_dir: session.cwd(),
        },
    }))
}

/// Remove the workspace. Succeeds when it is already gone.
pub fn clean(session: &RemoteSession, config: &PipelineConfig) -> Result<String> {
    let workspace = config.workspace();
    session.run(&format!("rm -rf {}/", shell::quote_arg(&workspace)))?;
    Ok(workspace)
}

/// Pack the local source tree, ship it and extract it over the workspace.
pub fn upload(
    session: &RemoteSession,
    local: &dyn LocalShell,
    config: &PipelineConfig,
) -> Result<UploadOutcome> {
    let archive = packager::pack(local, &config.source_path(), &config.local.archive_path)?;
    log_status!("upload", "Packed {} ({} bytes)", archive.path.display(), archive.bytes);

    let staging = &config.remote.staging_dir;
    let written = transfer::upload(session, &archive.path.to_string_lossy(), staging)?;
    let remote_archive = join_remote_path(staging, &artifact::file_name(&archive.path)?);

    session.within(staging, || {
        session.run(&format!(
            "tar -xf {}",
            shell::quote_arg(&artifact::file_name(&archive.path)?)
        ))?;

        session.within(&config.local.source_dir, || {
            for script in &config.remote.helper_scripts {
                session.run(&format!("cp {} .", shell::quote_arg(script)))?;
            }
            Ok(())
        })
    })?;

    Ok(UploadOutcome {
        archive,
        remote_archive: written.into_iter().next().unwrap_or(remote_archive),
        workspace: config.workspace(),
        helper_scripts: config.remote.helper_scripts.clone(),
    })
}

/// Copy each module's artifact for `interpreter` over its neutral name.
///
/// Returns the neutral paths now holding that interpreter's build.
pub fn select_artifacts(
    session: &RemoteSession,
    config: &PipelineConfig,
    interpreter: &Interpreter,
) -> Result<Vec<String>> {
    let workspace = config.workspace();
    let mut selected = Vec::with_capacity(config.modules.len());

    for module in &config.modules {
        let install_dir = join_remote_path(&workspace, &module.install_dir);
        session.within(&install_dir, || {
            session.run(&format!(
                "cp {} {}",
                shell::quote_arg(&module.stamped_artifact(interpreter)),
                shell::quote_arg(&module.artifact)
            ))
        })?;
        selected.push(join_remote_path(&install_dir, &module.artifact));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RemoteShell;
    use crate::ssh::CommandOutput;
    use std::cell::RefCell;
    use std::path::Path;

    struct Probe {
        exit_code: i32,
        commands: RefCell<Vec<String>>,
    }

    impl RemoteShell for Probe {
        fn host(&self) -> &str {
            "raspberry_dev_local"
        }

        fn execute(&self, command: &str) -> CommandOutput {
            self.commands.borrow_mut().push(command.to_string());
            match self.exit_code {
                0 => CommandOutput::ok(""),
                code => CommandOutput::failed(code, "ssh: connect to host: Connection refused"),
            }
        }

        fn upload_file(&self, _local_path: &Path, _remote_path: &str) -> CommandOutput {
            CommandOutput::ok("")
        }
    }

    fn probe(exit_code: i32) -> Probe {
        Probe {
            exit_code,
            commands: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn missing_workspace_is_reported_as_such() {
        let host = probe(1);
        let session = RemoteSession::new(&host);
        let err = ensure_exists(&session, "/tmp/source").unwrap_err();

        assert_eq!(err.code.as_str(), "workspace.not_found");
        assert_eq!(err.details["workspace"], "/tmp/source");
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn unreachable_host_is_command_failure() {
        let host = probe(255);
        let session = RemoteSession::new(&host);
        let err = ensure_exists(&session, "/tmp/source").unwrap_err();

        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["exitCode"], 255);
    }

    #[test]
    fn clean_removes_workspace_with_trailing_slash() {
        let host = probe(0);
        let session = RemoteSession::new(&host);
        clean(&session, &PipelineConfig::default()).unwrap();

        assert_eq!(*host.commands.borrow(), vec!["rm -rf /tmp/source/".to_string()]);
    }

    #[test]
    fn select_copies_stamped_over_neutral_for_every_module() {
        let host = probe(0);
        let session = RemoteSession::new(&host);
        let config = PipelineConfig::default();

        let selected = select_artifacts(&session, &config, &Interpreter::new("3.2")).unwrap();

        assert_eq!(
            selected,
            vec!["/tmp/source/RPIO/_GPIO.so", "/tmp/source/RPIO/PWM/_PWM.so"]
        );
        assert_eq!(
            *host.commands.borrow(),
            vec![
                "cd '/tmp/source/RPIO' && cp _GPIO32.so _GPIO.so".to_string(),
                "cd '/tmp/source/RPIO/PWM' && cp _PWM32.so _PWM.so".to_string(),
            ]
        );
        assert_eq!(session.cwd(), None);
    }
}
