//! Source distribution shipping and index publication.

use serde::Serialize;

use crate::config::{PipelineConfig, PublishMode};
use crate::confirm::ConfirmationProvider;
use crate::error::{Error, Result};
use crate::executor::{LocalShell, RemoteSession};
use crate::packager::{self, DistributionFile};
use crate::transfer;
use crate::utils::base_path::join_remote_path;
use crate::utils::shell;

#[derive(Debug, Clone, Serialize)]
pub struct DistributionUpload {
    pub distribution: DistributionFile,
    pub remote_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub mode: PublishMode,
    pub distribution: DistributionFile,
    pub remote_paths: Vec<String>,
    pub extract_dir: String,
    /// Interpreter versions an egg was built with.
    pub eggs: Vec<String>,
}

pub fn prompt_text(mode: PublishMode) -> String {
    match mode {
        PublishMode::Upload => {
            "Are you sure to upload the current version to PyPI? [y/N] ".to_string()
        }
        PublishMode::DryRun => {
            "Build the distribution and eggs without uploading (dry run)? [y/N] ".to_string()
        }
    }
}

/// Build a source distribution and copy it to the staging directory.
pub fn upload_distribution(
    session: &RemoteSession,
    local: &dyn LocalShell,
    config: &PipelineConfig,
) -> Result<DistributionUpload> {
    let distribution = packager::pack_distribution(
        local,
        &config.local.project_root,
        &config.local.dist_dir,
        &config.local.setup_command,
        PublishMode::DryRun,
    )?;

    let remote_paths = transfer::upload(
        session,
        &distribution.path.to_string_lossy(),
        &config.remote.staging_dir,
    )?;

    Ok(DistributionUpload {
        distribution,
        remote_paths,
    })
}

/// Publish after confirmation. A declined prompt does nothing at all.
pub fn publish(
    session: &RemoteSession,
    local: &dyn LocalShell,
    confirm: &dyn ConfirmationProvider,
    config: &PipelineConfig,
) -> Result<PublishOutcome> {
    let mode = config.publish.mode;
    if !confirm.confirm(&prompt_text(mode))? {
        return Err(Error::confirmation_declined("publish"));
    }

    let distribution = packager::pack_distribution(
        local,
        &config.local.project_root,
        &config.local.dist_dir,
        &config.local.setup_command,
        mode,
    )?;

    let staging = &config.remote.staging_dir;
    let remote_paths = transfer::upload(session, &distribution.path.to_string_lossy(), staging)?;

    let extract_dir = join_remote_path(staging, &distribution.extract_dir());
    session.within(staging, || {
        session.run(&format!("tar -xf {}", shell::quote_arg(&distribution.file_name)))
    })?;

    let mut eggs = Vec::with_capacity(config.publish.egg_interpreters.len());
    session.within(&extract_dir, || {
        for interpreter in &config.publish.egg_interpreters {
            let command = match mode.setup_suffix() {
                Some(suffix) => format!("{} setup.py bdist_egg {}", interpreter.executable, suffix),
                None => format!("{} setup.py bdist_egg", interpreter.executable),
            };
            session.run(&command)?;
            eggs.push(interpreter.version.clone());
        }
        Ok(())
    })?;

    log_status!(
        "publish",
        "{} {} ({}): {} egg(s)",
        distribution.project,
        distribution.version,
        mode.as_str(),
        eggs.len()
    );

    Ok(PublishOutcome {
        mode,
        distribution,
        remote_paths,
        extract_dir,
        eggs,
    })
}
