use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::protocol::{ShellError, ShellResult};
use super::Session;

/// Line, word and character counts of a file's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordCount {
    pub lines: usize,
    pub words: usize,
    /// Unicode scalar values for UTF-8 content, bytes otherwise.
    pub chars: usize,
    pub bytes: usize,
}

impl WordCount {
    pub fn render(&self, label: &str) -> String {
        format!(" {} {} {} {}", self.lines, self.words, self.chars, label)
    }
}

/// Counts `content`. A trailing segment without a newline counts as a line
/// when it is not empty, and `\r\n` counts once.
pub fn count_words(content: &[u8]) -> WordCount {
    match std::str::from_utf8(content) {
        Ok(text) => WordCount {
            lines: text.lines().count(),
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
            bytes: content.len(),
        },
        Err(_) => {
            let text = String::from_utf8_lossy(content);
            WordCount {
                lines: text.lines().count(),
                words: text.split_whitespace().count(),
                chars: content.len(),
                bytes: content.len(),
            }
        }
    }
}

/// Names of the direct entries of the current directory, in the order the
/// host returns them.
pub fn list(session: &Session) -> ShellResult<Vec<String>> {
    let dir = session.current_dir();
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)
        .map_err(|e| ShellError::io("Failed to read directory", e))? {
        let entry = entry.map_err(|e| ShellError::io("Failed to read entry", e))?;
        names.push(entry.file_name().to_string_lossy().to_string());
    }

    debug!(dir = %session.prompt_text(), entries = names.len(), "Listed directory");
    Ok(names)
}

pub fn word_count(session: &Session, fragment: &str, max_bytes: u64) -> ShellResult<WordCount> {
    let path = session.resolve(fragment)?;
    let metadata = metadata_for(&path, fragment)?;

    if !metadata.is_file() {
        return Err(ShellError::NotAFile(fragment.to_string()));
    }

    if metadata.len() > max_bytes {
        return Err(ShellError::io(
            format!("Cannot count {}", fragment),
            std::io::Error::new(
                ErrorKind::InvalidData,
                format!("file is larger than {} bytes", max_bytes),
            ),
        ));
    }

    let content = fs::read(&path)
        .map_err(|e| ShellError::io(format!("Failed to read {}", fragment), e))?;

    Ok(count_words(&content))
}

/// Recursively removes the directory named by `fragment` and returns its
/// resolved path.
///
/// The current directory and its ancestors are refused, so the session
/// never points at a removed directory.
pub fn remove_directory(session: &Session, fragment: &str) -> ShellResult<PathBuf> {
    let path = session.resolve(fragment)?;
    let metadata = metadata_for(&path, fragment)?;

    if !metadata.is_dir() {
        return Err(ShellError::NotADirectory(fragment.to_string()));
    }

    if session.current_dir().starts_with(&path) {
        return Err(ShellError::Busy(fragment.to_string()));
    }

    fs::remove_dir_all(&path)
        .map_err(|e| ShellError::io(format!("Failed to remove directory {}", fragment), e))?;

    info!(path = %session.display_path(&path), "Removed directory");
    Ok(path)
}

fn metadata_for(path: &std::path::Path, fragment: &str) -> ShellResult<fs::Metadata> {
    fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ShellError::NotFound(fragment.to_string()),
        _ => ShellError::io(format!("Cannot access {}", fragment), e),
    })
}
