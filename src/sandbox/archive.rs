use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::config::SandboxConfig;
use crate::protocol::{ShellError, ShellResult};

/// Counts describing an extracted tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Unpacks the ZIP archive at `archive_path` into `dest`, keeping the
/// relative layout recorded in the archive.
///
/// Entries whose names are absolute or climb out with `..` make the whole
/// archive invalid. The entry count and the total expanded size are bounded
/// by `limits`.
pub fn extract_zip(archive_path: &Path, dest: &Path, limits: &SandboxConfig) -> ShellResult<()> {
    extract_zip_cancellable(archive_path, dest, limits, &AtomicBool::new(false))
}

/// Like [`extract_zip`], but gives up with [`ShellError::Interrupted`] as
/// soon as `cancel` is set, including in the middle of a large entry.
pub fn extract_zip_cancellable(
    archive_path: &Path,
    dest: &Path,
    limits: &SandboxConfig,
    cancel: &AtomicBool,
) -> ShellResult<()> {
    let file = File::open(archive_path)
        .map_err(|e| ShellError::Archive(format!("cannot open {}: {}", archive_path.display(), e)))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ShellError::Archive(format!("{} is not a ZIP archive: {}", archive_path.display(), e)))?;

    if archive.len() > limits.max_entries {
        return Err(ShellError::Archive(format!(
            "archive has {} entries, the limit is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut written: u64 = 0;

    for index in 0..archive.len() {
        if cancel.load(Ordering::Relaxed) {
            return Err(interrupted(archive_path));
        }

        let mut entry = archive.by_index(index)
            .map_err(|e| ShellError::Archive(format!("cannot read entry {}: {}", index, e)))?;

        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                warn!(entry = %entry.name(), "Archive entry escapes the extraction root");
                return Err(ShellError::Archive(format!("entry '{}' has an unsafe path", entry.name())));
            }
        };
        let out_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| ShellError::io(format!("Failed to create {}", relative.display()), e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ShellError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let remaining = limits.max_extracted_bytes.saturating_sub(written);
        let mut outfile = File::create(&out_path)
            .map_err(|e| ShellError::io(format!("Failed to create {}", relative.display()), e))?;

        // The size in the header can lie; bound what is actually inflated.
        let mut limited = Cancellable {
            inner: (&mut entry).take(remaining.saturating_add(1)),
            cancel,
        };
        let copied = io::copy(&mut limited, &mut outfile).map_err(|e| {
            if cancel.load(Ordering::Relaxed) {
                interrupted(archive_path)
            } else {
                ShellError::Archive(format!("cannot extract '{}': {}", relative.display(), e))
            }
        })?;

        if copied > remaining {
            return Err(ShellError::Archive(format!(
                "archive expands beyond {} bytes",
                limits.max_extracted_bytes
            )));
        }

        written += copied;
        debug!(entry = %relative.display(), bytes = copied, "Extracted file");
    }

    Ok(())
}

fn interrupted(archive_path: &Path) -> ShellError {
    ShellError::Interrupted(format!("extraction of {} was cancelled", archive_path.display()))
}

/// Reader that fails once the shared flag is raised.
struct Cancellable<'a, R> {
    inner: R,
    cancel: &'a AtomicBool,
}

impl<R: Read> Read for Cancellable<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Other, "extraction cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Walks `root` and counts what is inside it, the root itself excluded.
pub fn summarize(root: &Path) -> TreeSummary {
    let mut summary = TreeSummary::default();

    for entry in WalkDir::new(root).min_depth(1).into_iter().filter_map(Result::ok) {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            summary.directories += 1;
        } else if file_type.is_file() {
            summary.files += 1;
            summary.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }

    summary
}
