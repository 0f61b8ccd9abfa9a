//! Remote path strings.
//!
//! SFTP paths are always `/`-separated regardless of the local platform,
//! so these helpers work on `str` rather than `std::path::Path`.

/// Normalize a remote path: `\` becomes `/`, runs of `/` collapse and a
/// trailing `/` is dropped. Root stays `/`, an empty path becomes `.`.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');

    let joined = path
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// `normalize` plus exactly one trailing `/`
pub fn with_trailing_slash(path: &str) -> String {
    let normalized = normalize(path);
    if normalized.ends_with('/') {
        normalized
    } else {
        normalized + "/"
    }
}

/// Concatenate a directory and a file name
pub fn join(dir: &str, name: &str) -> String {
    with_trailing_slash(dir) + name.trim_start_matches('/')
}

/// Every directory that has to exist for `path` to exist, outermost first.
///
/// `/a/b/c` gives `/a`, `/a/b`, `/a/b/c`. Root and `.` give nothing.
pub fn dir_chain(path: &str) -> Vec<String> {
    let normalized = normalize(path);
    let prefix = if normalized.starts_with('/') { "/" } else { "" };

    let mut chain = Vec::new();
    let mut current = String::from(prefix);
    for part in normalized.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);
        chain.push(current.clone());
    }
    chain
}

/// Extension filter used by listings: an empty filter matches everything,
/// otherwise the name only has to contain it.
pub fn matches_ext(name: &str, ext: &str) -> bool {
    ext.is_empty() || name.contains(ext)
}
