//! Local packaging: the source archive shipped by `upload`, and the source
//! distribution shipped by `upload_distribution` and `publish`.

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PublishMode;
use crate::error::{Error, Result};
use crate::executor::{run_local, LocalShell};
use crate::utils::{artifact, shell};

#[derive(Debug, Clone, Serialize)]
pub struct SourceArchive {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Compress `source_dir` into `archive`, overwriting any previous archive.
///
/// The archive holds the source directory itself (`source/...`), so it
/// extracts into a directory of the same name.
pub fn pack(local: &dyn LocalShell, source_dir: &Path, archive: &Path) -> Result<SourceArchive> {
    if !source_dir.is_dir() {
        return Err(Error::packaging_failed(
            source_dir.display().to_string(),
            "Source directory does not exist",
        ));
    }

    let name = artifact::file_name(source_dir)?;
    let parent = source_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let command = format!(
        "tar -czf {} {}",
        shell::quote_path(&archive.to_string_lossy()),
        shell::quote_arg(&name)
    );
    run_local(local, &command, Some(parent))?;

    if !archive.is_file() {
        return Err(Error::packaging_failed(
            archive.display().to_string(),
            "Archive was not produced",
        ));
    }

    let content = fs::read(archive).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", archive.display())))
    })?;

    Ok(SourceArchive {
        path: archive.to_path_buf(),
        sha256: format!("{:x}", Sha256::digest(&content)),
        bytes: content.len() as u64,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionFile {
    pub path: PathBuf,
    pub file_name: String,
    pub project: String,
    pub version: String,
}

impl DistributionFile {
    /// Parse `<project>-<version>.tar.gz` (or `.zip`, `.tar.bz2`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = artifact::file_name(path)?;
        let pattern = Regex::new(r"^(?P<project>.+?)-(?P<version>\d[\w.+!-]*?)\.(?:tar\.gz|tar\.bz2|zip)$")
            .map_err(|e| Error::internal_unexpected(e.to_string()))?;

        let caps = pattern.captures(&file_name).ok_or_else(|| {
            Error::packaging_failed(
                path.display().to_string(),
                format!("'{}' is not named <project>-<version>.tar.gz", file_name),
            )
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            project: caps["project"].to_string(),
            version: caps["version"].to_string(),
            file_name,
        })
    }

    /// Directory the distribution extracts into.
    pub fn extract_dir(&self) -> String {
        format!("{}-{}", self.project, self.version)
    }
}

/// Build a fresh source distribution and locate the file it produced.
///
/// The previous distribution directory is removed first so the listing
/// afterwards holds exactly the new file; its name is discovered, never
/// predicted.
pub fn pack_distribution(
    local: &dyn LocalShell,
    project_root: &Path,
    dist_dir: &str,
    setup_command: &str,
    mode: PublishMode,
) -> Result<DistributionFile> {
    run_local(
        local,
        &format!("rm -rf {}", shell::quote_arg(dist_dir)),
        Some(project_root),
    )?;

    let sdist = match mode.setup_suffix() {
        Some(suffix) => format!("{} sdist {}", setup_command, suffix),
        None => format!("{} sdist", setup_command),
    };
    run_local(local, &sdist, Some(project_root))?;

    let dist_path = project_root.join(dist_dir);
    let mut files = artifact::list_files(&dist_path)?;

    match files.len() {
        0 => Err(Error::packaging_failed(
            dist_path.display().to_string(),
            "Packaging produced no distribution file",
        )),
        1 => {
            let file = files.remove(0);
            log_status!("package", "Built {}", file.display());
            DistributionFile::from_path(&file)
        }
        n => Err(Error::packaging_failed(
            dist_path.display().to_string(),
            format!("Expected one distribution file, found {}", n),
        )),
    }
}
