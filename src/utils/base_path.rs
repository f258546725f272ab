/// Join a remote path onto a base directory. Absolute paths replace the base.
pub fn join_remote_path(base: &str, path: &str) -> String {
    let path = path.trim();

    if path.starts_with('/') || base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() || path == "." {
        return base.to_string();
    }

    if base.ends_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Resolve a stack of directories the way successive `cd` calls would.
pub fn resolve_dir_stack<S: AsRef<str>>(dirs: &[S]) -> Option<String> {
    if dirs.is_empty() {
        return None;
    }

    Some(
        dirs.iter()
            .fold(String::new(), |acc, dir| join_remote_path(&acc, dir.as_ref())),
    )
}
