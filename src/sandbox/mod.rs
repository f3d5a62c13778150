pub mod archive;
pub mod calendar;
pub mod commands;
pub mod session;
pub mod shell;
pub mod validator;

pub use session::*;
pub use shell::*;
pub use validator::*;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::config::SandboxConfig;
use crate::protocol::{ShellError, ShellResult};

/// A private, temporary directory tree holding the extracted archive.
///
/// The tree is removed by [`Sandbox::destroy`]. If a sandbox is dropped
/// without being destroyed (early return, panic) the backing [`TempDir`]
/// removes it instead.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    created_at: DateTime<Utc>,
    dir: TempDir,
}

impl Sandbox {
    /// Allocates an empty sandbox directory.
    pub fn allocate(config: &SandboxConfig) -> ShellResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&config.temp_prefix)
            .tempdir()
            .map_err(|e| ShellError::io("Failed to allocate sandbox directory", e))?;

        let root = dir.path().canonicalize()
            .map_err(|e| ShellError::io("Failed to resolve sandbox directory", e))?;

        debug!(root = %root.display(), "Sandbox allocated");

        Ok(Self {
            root,
            created_at: Utc::now(),
            dir,
        })
    }

    /// Allocates a sandbox and extracts the ZIP archive at `archive_path`
    /// into it. On failure nothing is left behind on the host.
    pub fn create(archive_path: &Path, config: &SandboxConfig) -> ShellResult<Self> {
        Self::create_cancellable(archive_path, config, &AtomicBool::new(false))
    }

    /// Same as [`Sandbox::create`], but extraction stops with
    /// [`ShellError::Interrupted`] once `cancel` is raised. The partial tree
    /// is removed before returning.
    pub fn create_cancellable(
        archive_path: &Path,
        config: &SandboxConfig,
        cancel: &AtomicBool,
    ) -> ShellResult<Self> {
        let sandbox = Self::allocate(config)?;

        if let Err(e) = archive::extract_zip_cancellable(archive_path, &sandbox.root, config, cancel) {
            if let Err(cleanup) = sandbox.destroy() {
                error!(error = %cleanup, "Failed to remove sandbox after extraction error");
            }
            return Err(e);
        }

        let summary = archive::summarize(&sandbox.root);
        info!(
            archive = %archive_path.display(),
            root = %sandbox.root.display(),
            files = summary.files,
            directories = summary.directories,
            bytes = summary.bytes,
            "Archive extracted into sandbox"
        );

        Ok(sandbox)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recursively removes the sandbox tree. Consumes the sandbox, so it runs
    /// at most once.
    pub fn destroy(self) -> ShellResult<()> {
        let root = self.root;
        let lifetime = Utc::now() - self.created_at;

        self.dir.close()
            .map_err(|e| ShellError::io(format!("Failed to remove sandbox {}", root.display()), e))?;

        info!(
            root = %root.display(),
            lifetime_secs = lifetime.num_seconds(),
            "Sandbox destroyed"
        );
        Ok(())
    }
}
