//! Copies local files to a directory on the target host.

use crate::error::{Error, ErrorCode, Result};
use crate::executor::RemoteSession;
use crate::utils::artifact;
use crate::utils::base_path::join_remote_path;

/// Upload every file matching `pattern` into `remote_dir`.
///
/// Returns the remote paths written, in upload order. Existing remote files
/// with the same name are overwritten.
pub fn upload(session: &RemoteSession, pattern: &str, remote_dir: &str) -> Result<Vec<String>> {
    let files = artifact::resolve_files(pattern).map_err(|e| match e.code {
        ErrorCode::TransferFailed => {
            let problem = e.details["problem"].as_str().unwrap_or(&e.message).to_string();
            Error::transfer_failed(pattern, remote_dir, problem)
        }
        _ => e,
    })?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let remote_path = join_remote_path(remote_dir, &artifact::file_name(&file)?);
        log_status!("transfer", "{} -> {}:{}", file.display(), session.host(), remote_path);

        let output = session.upload_file(&file, &remote_path);
        if !output.success {
            return Err(Error::transfer_failed(
                file.display().to_string(),
                remote_path,
                format!("exit {}: {}", output.exit_code, output.error_text()),
            ));
        }
        written.push(remote_path);
    }

    Ok(written)
}
