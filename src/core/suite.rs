//! Test stages run on the device against the installed artifacts.

use serde::Serialize;

use crate::config::{Interpreter, ModuleSpec, PipelineConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::executor::RemoteSession;
use crate::utils::base_path::join_remote_path;
use crate::utils::shell;
use crate::workspace;

#[derive(Debug, Clone, Serialize)]
pub struct SuiteRun {
    pub interpreter: String,
    pub selected: Vec<String>,
    pub output: String,
    /// Neutral artifacts put back to the primary build afterwards.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restored: Vec<String>,
}

/// Select `interpreter`'s artifacts and run the test runner under it.
pub fn run_suite(
    session: &RemoteSession,
    config: &PipelineConfig,
    interpreter: &Interpreter,
) -> Result<SuiteRun> {
    let workspace_dir = config.workspace();
    workspace::ensure_exists(session, &workspace_dir)?;

    let selected = workspace::select_artifacts(session, config, interpreter)?;

    let command = shell::with_sudo(
        &format!(
            "{} {}",
            interpreter.executable,
            shell::quote_arg(&config.test.runner)
        ),
        config.use_sudo,
    );
    let output = session.within(&workspace_dir, || session.run(&command))?;

    Ok(SuiteRun {
        interpreter: interpreter.version.clone(),
        selected,
        output: output.stdout,
        restored: Vec::new(),
    })
}

pub fn test(session: &RemoteSession, config: &PipelineConfig) -> Result<SuiteRun> {
    run_suite(session, config, config.primary_interpreter()?)
}

/// Run the suite under the alternate interpreter, then put the primary
/// artifacts back even when the suite failed.
pub fn test_alt_interpreter(session: &RemoteSession, config: &PipelineConfig) -> Result<SuiteRun> {
    let primary = config.primary_interpreter()?;
    let alternate = config.alternate_interpreter()?;

    let result = run_suite(session, config, alternate);

    if let Err(err) = &result {
        if err.code == ErrorCode::WorkspaceNotFound {
            return result;
        }
    }

    let restored = workspace::select_artifacts(session, config, primary);
    match (result, restored) {
        (Ok(mut run), Ok(restored)) => {
            run.restored = restored;
            Ok(run)
        }
        (Ok(_), Err(restore_err)) => Err(restore_err),
        (Err(err), Ok(_)) => Err(err),
        (Err(err), Err(restore_err)) => Err(err.with_hint(format!(
            "Restoring the Python {} artifacts also failed: {}",
            primary.version, restore_err.message
        ))),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestRun {
    pub module: String,
    pub output: String,
}

/// Rebuild a module's demo binary and run it on the device.
pub fn self_test(
    session: &RemoteSession,
    config: &PipelineConfig,
    module: &ModuleSpec,
) -> Result<SelfTestRun> {
    let Some(demo) = &module.self_test else {
        return Err(Error::config_invalid_value(
            "modules.self_test",
            Some(module.name.clone()),
            format!("Module '{}' has no self test", module.name),
        ));
    };

    let workspace_dir = config.workspace();
    workspace::ensure_exists(session, &workspace_dir)?;

    let build_dir = join_remote_path(&workspace_dir, &module.build_dir);
    let output = session.within(&build_dir, || {
        session.run(&format!("make {}", shell::quote_arg(&demo.make_target)))?;
        session.run(&shell::with_sudo(&demo.command, config.use_sudo))
    })?;

    Ok(SelfTestRun {
        module: module.name.clone(),
        output: output.stdout,
    })
}
