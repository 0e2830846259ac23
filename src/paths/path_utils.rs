// src/paths/path_utils.rs

//! Path helpers shared by path-set resolution and the watchers.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // macOS reports events under /private/var/... for /var/... roots.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Render a relative path with `/` separators and without a leading `./`.
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            other => Some(other.as_os_str().to_string_lossy().into_owned()),
        })
        .collect();
    parts.join("/")
}

/// Whether a path segment contains glob meta characters.
fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Literal directory prefix of a glob pattern.
///
/// `client/app/**/*.js` → `client/app`, `gulpfile.js` → `` (the root),
/// `server/server.js` → `server`, `**/*.css` → ``.
pub fn glob_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let literal_len = segments
        .iter()
        .position(|s| has_glob_meta(s))
        .unwrap_or(segments.len());

    // A fully literal pattern names a file; its base is the parent directory.
    let take = if literal_len == segments.len() {
        literal_len.saturating_sub(1)
    } else {
        literal_len
    };

    segments[..take].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_str_uses_forward_slashes() {
        let root = Path::new("/project");
        let path = Path::new("/project/client/app/main.js");
        assert_eq!(relative_str(root, path).as_deref(), Some("client/app/main.js"));
    }

    #[test]
    fn relative_str_outside_root_is_none() {
        assert_eq!(relative_str(Path::new("/project"), Path::new("/elsewhere/a.js")), None);
    }

    #[test]
    fn glob_base_stops_at_first_meta_segment() {
        assert_eq!(glob_base("client/app/**/*.js"), PathBuf::from("client/app"));
        assert_eq!(glob_base("./client/content/*.css"), PathBuf::from("client/content"));
        assert_eq!(glob_base("**/*.css"), PathBuf::new());
        assert_eq!(glob_base("server/server.js"), PathBuf::from("server"));
        assert_eq!(glob_base("Assetdag.toml"), PathBuf::new());
        assert_eq!(glob_base("client/{a,b}/x.js"), PathBuf::from("client"));
    }

    #[test]
    fn to_slash_drops_current_dir() {
        assert_eq!(to_slash(Path::new("./a/b.js")), "a/b.js");
    }
}
