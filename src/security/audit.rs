use crate::config::AuditConfig;
use crate::protocol::{ShellError, ShellResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub session_id: Uuid,
    pub resource: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    SessionStarted,
    SessionTerminated,
    CommandExecution,
    CommandRejected,
    PathEscapeRejected,
    DirectoryRemoved,
}

/// Records security-relevant session events through `tracing` and, when a
/// log file is configured, as JSON lines appended to that file.
#[derive(Debug)]
pub struct AuditLogger {
    session_id: Uuid,
    log_file: Option<PathBuf>,
    enabled: bool,
}

impl AuditLogger {
    pub fn new(config: &AuditConfig, session_id: Uuid) -> Self {
        Self {
            session_id,
            log_file: config.log_file.clone(),
            enabled: config.enabled,
        }
    }

    pub fn disabled(session_id: Uuid) -> Self {
        Self {
            session_id,
            log_file: None,
            enabled: false,
        }
    }

    pub fn log_security_event(&self, event: SecurityEvent) -> ShellResult<()> {
        if !self.enabled {
            return Ok(());
        }

        debug!("Security event: {:?}", event);

        if let Some(ref log_file) = self.log_file {
            self.log_to_file(log_file, &event)?;
        }

        tracing::info!(
            event_type = ?event.event_type,
            session_id = %event.session_id,
            resource = ?event.resource,
            details = %event.details,
            "Security event"
        );

        Ok(())
    }

    fn log_to_file(&self, log_file: &PathBuf, event: &SecurityEvent) -> ShellResult<()> {
        let log_entry = serde_json::to_string(event)
            .map_err(|e| ShellError::Config(format!("Failed to encode audit event: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| ShellError::io(format!("Failed to open audit log {}", log_file.display()), e))?;

        writeln!(file, "{}", log_entry)
            .map_err(|e| ShellError::io("Failed to write to audit log", e))?;

        file.flush()
            .map_err(|e| ShellError::io("Failed to flush audit log", e))?;

        Ok(())
    }

    fn event(&self, event_type: SecurityEventType, resource: Option<String>, details: String) -> SecurityEvent {
        SecurityEvent {
            event_type,
            session_id: self.session_id,
            resource,
            details,
            timestamp: Utc::now(),
        }
    }

    pub fn log_session_started(&self, archive: &str) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::SessionStarted,
            Some(archive.to_string()),
            "Session started".to_string(),
        );
        self.log_security_event(event)
    }

    pub fn log_session_terminated(&self, reason: &str) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::SessionTerminated,
            None,
            format!("Session terminated: {}", reason),
        );
        self.log_security_event(event)
    }

    pub fn log_command_execution(&self, command: &str) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::CommandExecution,
            Some(command.to_string()),
            format!("Executed command: {}", command),
        );
        self.log_security_event(event)
    }

    pub fn log_command_rejected(&self, command: &str, error: &ShellError) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::CommandRejected,
            Some(command.to_string()),
            format!("{}: {}", error.kind(), error),
        );
        self.log_security_event(event)
    }

    pub fn log_path_escape(&self, fragment: &str) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::PathEscapeRejected,
            Some(fragment.to_string()),
            "Path resolved outside the sandbox".to_string(),
        );
        self.log_security_event(event)
    }

    pub fn log_directory_removed(&self, path: &str) -> ShellResult<()> {
        let event = self.event(
            SecurityEventType::DirectoryRemoved,
            Some(path.to_string()),
            format!("Removed directory {}", path),
        );
        self.log_security_event(event)
    }
}
