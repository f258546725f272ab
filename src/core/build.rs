//! Per-module compilation.
//!
//! Every interpreter build of a module writes the same raw output file in the
//! module's build directory, so that file is a single-slot resource. An
//! [`OutputSlot`] is leased mutably for one build target at a time and the
//! lease only moves forward: acquire, compile, verify, install. Installing
//! consumes the lease and frees the slot for the next interpreter.

use serde::Serialize;

use crate::config::{Interpreter, ModuleSpec, PipelineConfig};
use crate::error::{Error, Result, SmokeTestFailedDetails};
use crate::executor::RemoteSession;
use crate::utils::base_path::join_remote_path;
use crate::utils::shell;
use crate::workspace;

/// One module compiled for one interpreter.
#[derive(Debug, Clone, Copy)]
pub struct BuildTarget<'c> {
    pub module: &'c ModuleSpec,
    pub interpreter: &'c Interpreter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltArtifact {
    pub module: String,
    pub interpreter: String,
    /// Version string printed by the import check.
    pub version: String,
    /// Version-stamped artifact in the library directory.
    pub path: String,
    /// Interpreter-neutral copy, written for the primary interpreter only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral: Option<String>,
}

/// The raw output file of one module's build directory.
pub struct OutputSlot<'c> {
    module: &'c ModuleSpec,
    build_dir: String,
    install_dir: String,
}

impl<'c> OutputSlot<'c> {
    pub fn new(module: &'c ModuleSpec, workspace: &str) -> Self {
        Self {
            module,
            build_dir: join_remote_path(workspace, &module.build_dir),
            install_dir: join_remote_path(workspace, &module.install_dir),
        }
    }

    /// Lease the slot for `interpreter`, clearing any stale raw output.
    pub fn acquire<'s>(
        &'s mut self,
        session: &RemoteSession,
        interpreter: &'c Interpreter,
    ) -> Result<SlotLease<'s, 'c>> {
        session.within(&self.build_dir, || {
            session.run(&format!("rm -f {}", shell::quote_arg(&self.module.artifact)))
        })?;

        Ok(SlotLease {
            slot: self,
            interpreter,
        })
    }
}

/// Slot leased, nothing built yet.
pub struct SlotLease<'s, 'c> {
    slot: &'s mut OutputSlot<'c>,
    interpreter: &'c Interpreter,
}

/// Raw output compiled and in place under the artifact name.
pub struct CompiledLease<'s, 'c> {
    slot: &'s mut OutputSlot<'c>,
    interpreter: &'c Interpreter,
}

/// Raw output imported and printed its version.
pub struct VerifiedLease<'s, 'c> {
    slot: &'s mut OutputSlot<'c>,
    interpreter: &'c Interpreter,
    version: String,
}

impl<'s, 'c> SlotLease<'s, 'c> {
    pub fn target(&self) -> BuildTarget<'c> {
        BuildTarget {
            module: self.slot.module,
            interpreter: self.interpreter,
        }
    }

    pub fn compile(self, session: &RemoteSession) -> Result<CompiledLease<'s, 'c>> {
        let module = self.slot.module;
        session.within(&self.slot.build_dir, || {
            session.run(&format!(
                "make {}",
                shell::quote_arg(&module.make_target_for(self.interpreter))
            ))?;
            if let Some(output) = &module.build_output {
                session.run(&format!(
                    "cp {} {}",
                    shell::quote_arg(output),
                    shell::quote_arg(&module.artifact)
                ))?;
            }
            Ok(())
        })?;

        Ok(CompiledLease {
            slot: self.slot,
            interpreter: self.interpreter,
        })
    }
}

impl<'s, 'c> CompiledLease<'s, 'c> {
    /// Import the fresh build and require a non-empty printed version.
    pub fn verify(self, session: &RemoteSession, use_sudo: bool) -> Result<VerifiedLease<'s, 'c>> {
        let module = self.slot.module;
        let command = shell::with_sudo(
            &format!(
                "{} -c {}",
                self.interpreter.executable,
                shell::quote_path(&module.smoke_test_snippet())
            ),
            use_sudo,
        );

        let output = session.within(&self.slot.build_dir, || session.run(&command))?;
        let version = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default()
            .to_string();

        if version.is_empty() {
            return Err(Error::build_smoke_test_failed(SmokeTestFailedDetails {
                module: module.name.clone(),
                interpreter: self.interpreter.version.clone(),
                command,
                stdout: output.stdout,
            }));
        }

        log_status!(
            "build",
            "{} for Python {} reports version {}",
            module.name,
            self.interpreter.version,
            version
        );

        Ok(VerifiedLease {
            slot: self.slot,
            interpreter: self.interpreter,
            version,
        })
    }
}

impl VerifiedLease<'_, '_> {
    /// Move the build into the library directory under its stamped name.
    ///
    /// With `primary`, the neutral name in the library directory receives a
    /// copy first.
    pub fn install(self, session: &RemoteSession, primary: bool) -> Result<BuiltArtifact> {
        let module = self.slot.module;
        let stamped = join_remote_path(
            &self.slot.install_dir,
            &module.stamped_artifact(self.interpreter),
        );
        let neutral = join_remote_path(&self.slot.install_dir, &module.artifact);

        session.within(&self.slot.build_dir, || {
            if primary {
                session.run(&format!(
                    "cp {} {}",
                    shell::quote_arg(&module.artifact),
                    shell::quote_arg(&neutral)
                ))?;
            }
            session.run(&format!(
                "mv {} {}",
                shell::quote_arg(&module.artifact),
                shell::quote_arg(&stamped)
            ))
        })?;

        Ok(BuiltArtifact {
            module: module.name.clone(),
            interpreter: self.interpreter.version.clone(),
            version: self.version,
            path: stamped,
            neutral: primary.then_some(neutral),
        })
    }
}

/// Build `module` for every configured interpreter, oldest first.
pub fn build_module(
    session: &RemoteSession,
    config: &PipelineConfig,
    module: &ModuleSpec,
) -> Result<Vec<BuiltArtifact>> {
    let workspace_dir = config.workspace();
    workspace::ensure_exists(session, &workspace_dir)?;

    let mut slot = OutputSlot::new(module, &workspace_dir);
    let mut built = Vec::with_capacity(config.interpreters.len());

    for (idx, interpreter) in config.interpreters.iter().enumerate() {
        log_status!("build", "{} for Python {}", module.name, interpreter.version);
        let artifact = slot
            .acquire(session, interpreter)?
            .compile(session)?
            .verify(session, config.use_sudo)?
            .install(session, idx == 0)?;
        built.push(artifact);
    }

    Ok(built)
}
