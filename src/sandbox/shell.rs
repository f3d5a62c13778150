use tracing::{debug, warn};

use crate::config::{CalendarConfig, CommandConfig, Config};
use crate::protocol::{CalendarMonth, Command, ShellError, ShellResult};
use crate::security::AuditLogger;
use super::{calendar, commands, Session};

/// What the caller should do after a line has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text to show the user.
    Output(String),
    /// Nothing to show (blank line, successful `cd`).
    Silent,
    /// The user asked to end the session.
    Exit,
}

/// Routes parsed commands to the command set against one [`Session`].
#[derive(Debug)]
pub struct SandboxedShell {
    hostname: String,
    session: Session,
    commands: CommandConfig,
    calendar: CalendarConfig,
    audit: AuditLogger,
}

impl SandboxedShell {
    pub fn new(hostname: impl Into<String>, session: Session, config: &Config) -> Self {
        let audit = AuditLogger::new(&config.audit, session.id());

        Self {
            hostname: hostname.into(),
            session,
            commands: config.commands.clone(),
            calendar: config.calendar.clone(),
            audit,
        }
    }

    pub fn with_audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// `<hostname>:<path>$ `, with the sandbox root shown as `/`.
    pub fn get_shell_prompt(&self) -> String {
        format!("{}:{}$ ", self.hostname, self.session.prompt_text())
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Parses and runs one input line. Errors are command-level and leave
    /// the session usable.
    pub fn dispatch(&mut self, line: &str) -> ShellResult<Outcome> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Outcome::Silent),
            Err(e) => {
                self.record(self.audit.log_command_rejected(line.trim(), &e));
                return Err(e);
            }
        };

        debug!(command = command.name(), "Dispatching command");
        self.record(self.audit.log_command_execution(line.trim()));

        let result = self.execute(command);

        if let Err(ShellError::PathEscape(ref fragment)) = result {
            self.record(self.audit.log_path_escape(fragment));
        }

        result
    }

    fn execute(&mut self, command: Command) -> ShellResult<Outcome> {
        match command {
            Command::Ls => {
                let entries = commands::list(&self.session)?;
                if entries.is_empty() {
                    Ok(Outcome::Silent)
                } else {
                    Ok(Outcome::Output(entries.join("\n")))
                }
            }
            Command::Cd(path) => {
                self.session.change_directory(&path)?;
                Ok(Outcome::Silent)
            }
            Command::Wc(path) => {
                let count = commands::word_count(&self.session, &path, self.commands.max_wc_bytes)?;
                Ok(Outcome::Output(count.render(&path)))
            }
            Command::Rmdir(path) => {
                let removed = commands::remove_directory(&self.session, &path)?;
                self.record(self.audit.log_directory_removed(&self.session.display_path(&removed)));
                Ok(Outcome::Output(format!("Directory {} removed.", path)))
            }
            Command::Cal(month) => {
                let CalendarMonth { month, year } = month.unwrap_or(CalendarMonth {
                    month: self.calendar.default_month,
                    year: self.calendar.default_year,
                });
                Ok(Outcome::Output(calendar::format_month(year, month)?))
            }
            Command::Exit => Ok(Outcome::Exit),
        }
    }

    // Audit failures are logged and never fail the command itself.
    fn record(&self, result: ShellResult<()>) {
        if let Err(e) = result {
            warn!(error = %e, "Failed to write audit event");
        }
    }

    /// Records the end of the session and tears the sandbox down.
    pub fn close(self, reason: &str) -> ShellResult<()> {
        self.record(self.audit.log_session_terminated(reason));
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, SandboxConfig};
    use crate::sandbox::Sandbox;
    use std::fs;
    use tempfile::TempDir;

    fn shell_with_tree() -> SandboxedShell {
        let sandbox = Sandbox::allocate(&SandboxConfig::default()).unwrap();
        let root = sandbox.root().to_path_buf();
        fs::write(root.join("file1.txt"), "Hello World\nThis is a test file.\n").unwrap();
        fs::create_dir(root.join("dir1")).unwrap();
        fs::write(root.join("dir1").join("file2.txt"), "Another file in a directory.\n").unwrap();
        fs::create_dir(root.join("test_dir")).unwrap();

        let session = Session::new(sandbox).unwrap();
        let audit = AuditLogger::disabled(session.id());
        SandboxedShell::new("testhost", session, &Config::default()).with_audit_logger(audit)
    }

    fn output(outcome: Outcome) -> String {
        match outcome {
            Outcome::Output(text) => text,
            other => panic!("expected output, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_follows_current_directory() {
        let mut shell = shell_with_tree();
        assert_eq!(shell.get_shell_prompt(), "testhost:/$ ");

        assert_eq!(shell.dispatch("cd dir1").unwrap(), Outcome::Silent);
        assert_eq!(shell.get_shell_prompt(), "testhost:dir1$ ");

        shell.dispatch("cd ..").unwrap();
        assert_eq!(shell.get_shell_prompt(), "testhost:/$ ");
    }

    #[test]
    fn test_ls_lists_entries() {
        let mut shell = shell_with_tree();
        let listing = output(shell.dispatch("ls").unwrap());
        let mut entries: Vec<&str> = listing.lines().collect();
        entries.sort();

        assert_eq!(entries, vec!["dir1", "file1.txt", "test_dir"]);
    }

    #[test]
    fn test_wc_output_format() {
        let mut shell = shell_with_tree();
        assert_eq!(output(shell.dispatch("wc file1.txt").unwrap()), " 2 7 33 file1.txt");

        shell.dispatch("cd dir1").unwrap();
        assert_eq!(output(shell.dispatch("wc ../file1.txt").unwrap()), " 2 7 33 ../file1.txt");
    }

    #[test]
    fn test_rmdir_dispatch() {
        let mut shell = shell_with_tree();
        let root = shell.session().root().to_path_buf();

        assert_eq!(output(shell.dispatch("rmdir test_dir").unwrap()), "Directory test_dir removed.");
        assert!(!root.join("test_dir").exists());
        assert!(root.join("dir1").exists());
    }

    #[test]
    fn test_cal_default_and_explicit() {
        let mut shell = shell_with_tree();

        let default = output(shell.dispatch("cal").unwrap());
        assert!(default.starts_with("   November 2023\n"));

        let explicit = output(shell.dispatch("cal 2 2024").unwrap());
        assert!(explicit.starts_with("   February 2024\n"));

        assert!(matches!(shell.dispatch("cal 13 2024"), Err(ShellError::Parse(_))));
        assert!(matches!(shell.dispatch("cal x y"), Err(ShellError::Parse(_))));
    }

    #[test]
    fn test_unknown_command_changes_nothing() {
        let mut shell = shell_with_tree();
        shell.dispatch("cd dir1").unwrap();
        let before_dir = shell.session().current_dir().to_path_buf();
        let before_entries = fs::read_dir(shell.session().root()).unwrap().count();

        let err = shell.dispatch("mkdir new").unwrap_err();
        assert!(matches!(err, ShellError::UnknownCommand(_)));
        assert_eq!(err.to_string(), "Unknown command: mkdir");

        assert_eq!(shell.session().current_dir(), before_dir);
        assert_eq!(fs::read_dir(shell.session().root()).unwrap().count(), before_entries);
    }

    #[test]
    fn test_errors_do_not_end_session() {
        let mut shell = shell_with_tree();

        assert!(matches!(shell.dispatch("cd ../.."), Err(ShellError::PathEscape(_))));
        assert!(matches!(shell.dispatch("wc dir1"), Err(ShellError::NotAFile(_))));
        assert!(matches!(shell.dispatch("rmdir file1.txt"), Err(ShellError::NotADirectory(_))));

        assert_eq!(shell.dispatch("").unwrap(), Outcome::Silent);
        assert_eq!(shell.dispatch("exit").unwrap(), Outcome::Exit);
    }

    #[test]
    fn test_path_escape_is_audited() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.jsonl");
        let mut config = Config::default();
        config.audit = AuditConfig {
            enabled: true,
            log_file: Some(log_path.clone()),
        };

        let session = Session::new(Sandbox::allocate(&config.sandbox).unwrap()).unwrap();
        let mut shell = SandboxedShell::new("testhost", session, &config);

        assert!(shell.dispatch("cd ../../etc").is_err());
        shell.close("exit").unwrap();

        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("\"command_execution\""));
        assert!(log.contains("\"path_escape_rejected\""));
        assert!(log.contains("\"session_terminated\""));
    }

    #[test]
    fn test_close_removes_sandbox() {
        let shell = shell_with_tree();
        let root = shell.session().root().to_path_buf();

        shell.close("exit").unwrap();
        assert!(!root.exists());
    }
}
