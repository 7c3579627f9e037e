use crate::SvnError;

/// Canonicalizes a path relative to the session URL.
///
/// Leading/trailing separators, empty segments and `.` are dropped and
/// backslashes become `/`. `..` segments and NUL bytes are rejected. An empty
/// result is only accepted when `allow_empty` is set (it names the session
/// URL itself).
fn canonicalize_rel_path(path: &str, allow_empty: bool) -> Result<String, SvnError> {
    let raw = path.trim();

    #[cfg(windows)]
    if raw.starts_with("\\\\") {
        return Err(SvnError::InvalidPath(format!("unsafe path: {raw}")));
    }

    if raw.contains('\0') {
        return Err(SvnError::InvalidPath("path contains NUL byte".into()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for seg in raw.split(['/', '\\']) {
        match seg {
            "" | "." => continue,
            ".." => return Err(SvnError::InvalidPath(format!("unsafe path: {raw}"))),
            _ => parts.push(seg),
        }
    }

    #[cfg(windows)]
    if let Some(first) = parts.first()
        && first.len() >= 2
        && first.as_bytes()[1] == b':'
        && first.as_bytes()[0].is_ascii_alphabetic()
    {
        return Err(SvnError::InvalidPath(format!("unsafe path: {raw}")));
    }

    if parts.is_empty() && !allow_empty {
        return Err(SvnError::InvalidPath("empty path".into()));
    }
    Ok(parts.join("/"))
}

/// Validates the path of a node that must name something below the session
/// URL (a file to fetch).
pub(crate) fn validate_rel_path(path: &str) -> Result<String, SvnError> {
    canonicalize_rel_path(path, false)
}

/// Validates a path that may be empty (probing the session URL itself).
pub(crate) fn validate_rel_dir_path(path: &str) -> Result<String, SvnError> {
    canonicalize_rel_path(path, true)
}

/// Joins a canonical relative path onto a repository URL.
pub(crate) fn join_url(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    if rel.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rel}")
    }
}
