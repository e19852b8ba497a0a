// src/watch/path_utils.rs

use std::path::Path;

/// `path` relative to `root`, with forward slashes.
///
/// Falls back to canonicalized paths when the direct prefix doesn't match
/// (symlinked roots, `/private/var` on macOS). `None` when `path` is outside
/// `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // Deleted files can't be canonicalized; try their parent instead.
    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_str(Path::new("/proj"), Path::new("/proj/src/main.rs")).as_deref(),
            Some("src/main.rs")
        );
    }

    #[test]
    fn outside_root_is_none() {
        assert_eq!(
            relative_str(Path::new("/definitely/not/here"), Path::new("/elsewhere/x")),
            None
        );
    }

    #[test]
    fn deleted_file_under_symlinked_root_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let canon = dir.path().canonicalize().unwrap();
        let gone = canon.join("gone.txt");
        assert_eq!(relative_str(dir.path(), &gone).as_deref(), Some("gone.txt"));
    }
}
