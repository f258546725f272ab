use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "pifab.json";

/// Base pifab config directory (~/.config/pifab/ on all platforms)
pub fn pifab() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("pifab"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("pifab"))
    }
}

/// Global pifab.json path
pub fn global_config() -> Result<PathBuf> {
    Ok(pifab()?.join(CONFIG_FILE_NAME))
}

/// Project-local pifab.json path (current directory)
pub fn project_config() -> Result<PathBuf> {
    let cwd = env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("read current dir".to_string())))?;
    Ok(cwd.join(CONFIG_FILE_NAME))
}
