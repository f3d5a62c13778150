use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{ShellError, ShellResult};
use super::{PathValidator, Sandbox};

/// Mutable state of one interactive run: the sandbox and the current
/// directory inside it.
///
/// `current_dir` always names an existing directory under the sandbox root
/// at the time it was stored, and only changes through
/// [`Session::change_directory`].
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    sandbox: Sandbox,
    validator: PathValidator,
    current_dir: PathBuf,
}

impl Session {
    pub fn new(sandbox: Sandbox) -> ShellResult<Self> {
        let validator = PathValidator::new(sandbox.root().to_path_buf())?;
        let current_dir = validator.root_path().to_path_buf();

        Ok(Self {
            id: Uuid::new_v4(),
            sandbox,
            validator,
            current_dir,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    pub fn root(&self) -> &Path {
        self.validator.root_path()
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    pub fn resolve(&self, fragment: &str) -> ShellResult<PathBuf> {
        self.validator.resolve(&self.current_dir, fragment)
    }

    /// Moves into `fragment`. On any error the current directory is left
    /// as it was.
    pub fn change_directory(&mut self, fragment: &str) -> ShellResult<()> {
        let target = self.resolve(fragment)?;

        let metadata = std::fs::metadata(&target).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShellError::NotFound(fragment.to_string()),
            _ => ShellError::io(format!("Cannot access {}", fragment), e),
        })?;

        if !metadata.is_dir() {
            return Err(ShellError::NotADirectory(fragment.to_string()));
        }

        debug!(
            session_id = %self.id,
            from = %self.validator.display_path(&self.current_dir),
            to = %self.validator.display_path(&target),
            "Changed directory"
        );
        self.current_dir = target;
        Ok(())
    }

    /// The current directory relative to the root, `/` at the root.
    pub fn prompt_text(&self) -> String {
        self.validator.display_path(&self.current_dir)
    }

    pub fn display_path(&self, path: &Path) -> String {
        self.validator.display_path(path)
    }

    /// Ends the session and removes the sandbox.
    pub fn close(self) -> ShellResult<()> {
        debug!(session_id = %self.id, "Closing session");
        self.sandbox.destroy()
    }
}
