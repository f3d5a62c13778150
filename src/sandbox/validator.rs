use std::path::{Component, Path, PathBuf};
use tracing::debug;
use crate::protocol::{ShellError, ShellResult};

/// Resolves user-supplied path fragments and proves they stay inside the
/// sandbox root.
///
/// Containment is checked component-wise on lexically normalized paths, so a
/// sibling such as `root_evil` is never mistaken for a child of `root`.
/// Paths that already exist are canonicalized and checked again, which
/// catches symlinks pointing out of the tree.
#[derive(Debug, Clone)]
pub struct PathValidator {
    root_path: PathBuf,
}

impl PathValidator {
    pub fn new(root_path: PathBuf) -> ShellResult<Self> {
        let canonical_root = root_path.canonicalize()
            .map_err(|e| ShellError::io(format!("Cannot canonicalize root path {}", root_path.display()), e))?;

        Ok(Self {
            root_path: canonical_root,
        })
    }

    /// Resolves `fragment` against `current_dir`.
    ///
    /// Relative fragments are joined onto `current_dir`; fragments starting
    /// with a separator are rooted at the sandbox root. Existence is not
    /// checked.
    pub fn resolve(&self, current_dir: &Path, fragment: &str) -> ShellResult<PathBuf> {
        if fragment.contains('\0') {
            return Err(ShellError::Parse("Path contains a NUL byte".to_string()));
        }

        let requested_path = Path::new(fragment);

        let absolute_path = if requested_path.has_root() {
            let relative: PathBuf = requested_path
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                .collect();
            self.root_path.join(relative)
        } else {
            current_dir.join(requested_path)
        };

        let normalized = normalize(&absolute_path);

        if !self.contains(&normalized) {
            debug!(fragment = %fragment, "Rejected path outside the sandbox");
            return Err(ShellError::PathEscape(fragment.to_string()));
        }

        // Lexically contained; make sure no symlink on the way leads out.
        if let Ok(canonical_path) = normalized.canonicalize() {
            if !self.contains(&canonical_path) {
                debug!(fragment = %fragment, "Rejected symlink leading outside the sandbox");
                return Err(ShellError::PathEscape(fragment.to_string()));
            }
        }

        Ok(normalized)
    }

    /// True when `path` equals the root or is nested under it.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root_path)
    }

    pub fn get_relative_path(&self, absolute_path: &Path) -> ShellResult<PathBuf> {
        absolute_path.strip_prefix(&self.root_path)
            .map(|p| p.to_path_buf())
            .map_err(|_| ShellError::PathEscape(absolute_path.display().to_string()))
    }

    /// Renders a contained path relative to the root, with the root itself
    /// shown as `/`.
    pub fn display_path(&self, absolute_path: &Path) -> String {
        match self.get_relative_path(absolute_path) {
            Ok(relative) if relative.as_os_str().is_empty() => "/".to_string(),
            Ok(relative) => relative.to_string_lossy().to_string(),
            Err(_) => "?".to_string(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// Collapses `.` and `..` without touching the filesystem. `..` at the
/// filesystem root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(name) => normalized.push(name),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox_with_sibling() -> (TempDir, PathValidator) {
        let outer = TempDir::new().unwrap();
        std::fs::create_dir(outer.path().join("root")).unwrap();
        std::fs::create_dir(outer.path().join("root").join("dir1")).unwrap();
        std::fs::create_dir(outer.path().join("root_evil")).unwrap();
        std::fs::write(outer.path().join("root_evil").join("loot.txt"), "secret").unwrap();

        let validator = PathValidator::new(outer.path().join("root")).unwrap();
        (outer, validator)
    }

    #[test]
    fn test_path_validation() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();

        // Valid relative path, existence not required
        let valid_path = validator.resolve(&root, "test.txt").unwrap();
        assert_eq!(valid_path, root.join("test.txt"));

        // Invalid path traversal
        let invalid_path = validator.resolve(&root, "../../../etc/passwd");
        assert!(matches!(invalid_path, Err(ShellError::PathEscape(_))));
    }

    #[test]
    fn test_prefix_named_sibling_is_rejected() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();

        assert!(matches!(
            validator.resolve(&root, "../root_evil"),
            Err(ShellError::PathEscape(_))
        ));
        assert!(matches!(
            validator.resolve(&root.join("dir1"), "../../root_evil/loot.txt"),
            Err(ShellError::PathEscape(_))
        ));
    }

    #[test]
    fn test_parent_of_root_is_rejected() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();

        assert!(matches!(validator.resolve(&root, ".."), Err(ShellError::PathEscape(_))));
        assert!(matches!(validator.resolve(&root, "dir1/../.."), Err(ShellError::PathEscape(_))));
    }

    #[test]
    fn test_normalization_within_root() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();
        let dir1 = root.join("dir1");

        assert_eq!(validator.resolve(&dir1, "..").unwrap(), root);
        assert_eq!(validator.resolve(&root, "./dir1/./").unwrap(), dir1);
        assert_eq!(validator.resolve(&root, "dir1/../dir1").unwrap(), dir1);
        assert_eq!(validator.resolve(&dir1, "").unwrap(), dir1);
    }

    #[test]
    fn test_absolute_fragment_is_rooted_at_sandbox() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();
        let dir1 = root.join("dir1");

        assert_eq!(validator.resolve(&dir1, "/").unwrap(), root);
        assert_eq!(validator.resolve(&dir1, "/dir1").unwrap(), dir1);
        assert_eq!(validator.resolve(&root, "/etc/passwd").unwrap(), root.join("etc/passwd"));
        assert!(matches!(validator.resolve(&root, "/../etc"), Err(ShellError::PathEscape(_))));
    }

    #[test]
    fn test_resolved_paths_never_leave_root() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();
        let fragments = [
            ".", "..", "../..", "dir1", "dir1/..", "dir1/../..", "/", "/..", "a/b/../../..",
            "../root", "../root/dir1", "../root_evil", "./../root_evil", "dir1/./../../root",
        ];

        for fragment in fragments {
            for base in [root.clone(), root.join("dir1")] {
                if let Ok(resolved) = validator.resolve(&base, fragment) {
                    assert!(resolved.starts_with(&root), "{} escaped to {}", fragment, resolved.display());
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_rejected() {
        let (outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();
        std::os::unix::fs::symlink(outer.path().join("root_evil"), root.join("link")).unwrap();

        assert!(matches!(validator.resolve(&root, "link"), Err(ShellError::PathEscape(_))));
        assert!(matches!(validator.resolve(&root, "link/loot.txt"), Err(ShellError::PathEscape(_))));
    }

    #[test]
    fn test_nul_byte_rejected() {
        let (_outer, validator) = sandbox_with_sibling();
        let root = validator.root_path().to_path_buf();
        assert!(matches!(validator.resolve(&root, "a\0b"), Err(ShellError::Parse(_))));
    }

    #[test]
    fn test_relative_path_conversion() {
        let temp_dir = TempDir::new().unwrap();
        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();
        let root = validator.root_path().to_path_buf();

        let relative = validator.get_relative_path(&root.join("test.txt")).unwrap();
        assert_eq!(relative, Path::new("test.txt"));

        assert_eq!(validator.display_path(&root), "/");
        assert_eq!(validator.display_path(&root.join("dir1")), "dir1");
    }
}
