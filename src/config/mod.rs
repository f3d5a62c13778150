use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::protocol::{ShellError, ShellResult, MAX_CALENDAR_YEAR, MIN_CALENDAR_YEAR};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sandbox: SandboxConfig,
    pub commands: CommandConfig,
    pub calendar: CalendarConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub temp_prefix: String,
    pub max_entries: usize,
    pub max_extracted_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub max_wc_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub default_month: u32,
    pub default_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            temp_prefix: "vfsh-".to_string(),
            max_entries: 10_000,
            max_extracted_bytes: 256 * 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_extracted_bytes(mut self, max_bytes: u64) -> Self {
        self.max_extracted_bytes = max_bytes;
        self
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            max_wc_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for CalendarConfig {
    // Fixed so `cal` output is identical across runs.
    fn default() -> Self {
        Self {
            default_month: 11,
            default_year: 2023,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ShellResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShellError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ShellError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ShellResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShellError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ShellError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Loads `path` if it exists; otherwise returns the defaults without
    /// writing anything to disk.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ShellResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn get_default_config_path() -> ShellResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ShellError::Config("Cannot determine the user config directory".to_string()))?;

        Ok(config_dir.join("vfsh").join("vfsh.toml"))
    }

    pub fn validate(&self) -> ShellResult<()> {
        if self.sandbox.temp_prefix.contains(['/', '\\']) {
            return Err(ShellError::Config("sandbox.temp_prefix must not contain path separators".to_string()));
        }

        if self.sandbox.max_entries == 0 {
            return Err(ShellError::Config("sandbox.max_entries must be greater than 0".to_string()));
        }

        if self.commands.max_wc_bytes == 0 {
            return Err(ShellError::Config("commands.max_wc_bytes must be greater than 0".to_string()));
        }

        if !(1..=12).contains(&self.calendar.default_month) {
            return Err(ShellError::Config("calendar.default_month must be between 1 and 12".to_string()));
        }

        if !(MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&self.calendar.default_year) {
            return Err(ShellError::Config(format!(
                "calendar.default_year must be between {} and {}",
                MIN_CALENDAR_YEAR, MAX_CALENDAR_YEAR
            )));
        }

        Ok(())
    }
}
