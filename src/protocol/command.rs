use super::{ShellError, ShellResult};

pub const MIN_CALENDAR_YEAR: i32 = 1;
pub const MAX_CALENDAR_YEAR: i32 = 9999;

const CAL_USAGE: &str = "Usage: cal [<month> <year>] (month 1-12, year 1-9999)";

/// A single parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ls,
    Cd(String),
    Wc(String),
    Rmdir(String),
    /// `None` renders the configured default month.
    Cal(Option<CalendarMonth>),
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarMonth {
    pub month: u32,
    pub year: i32,
}

impl Command {
    /// Parses one line of input. Blank lines yield `Ok(None)`.
    ///
    /// The line is split on its first run of whitespace; commands taking a
    /// path receive the whole remainder, so `cd my dir` changes into `my dir`.
    pub fn parse(line: &str) -> ShellResult<Option<Command>> {
        let (name, rest) = split_command(line);

        let command = match name {
            "" => return Ok(None),
            "ls" => {
                no_arguments("ls", rest)?;
                Command::Ls
            }
            "cd" => Command::Cd(path_argument("cd", rest)?),
            "wc" => Command::Wc(path_argument("wc", rest)?),
            "rmdir" => Command::Rmdir(path_argument("rmdir", rest)?),
            "cal" => Command::Cal(calendar_arguments(rest)?),
            "exit" => {
                no_arguments("exit", rest)?;
                Command::Exit
            }
            other => return Err(ShellError::UnknownCommand(other.to_string())),
        };

        Ok(Some(command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ls => "ls",
            Command::Cd(_) => "cd",
            Command::Wc(_) => "wc",
            Command::Rmdir(_) => "rmdir",
            Command::Cal(_) => "cal",
            Command::Exit => "exit",
        }
    }
}

fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(index) => (&line[..index], line[index..].trim_start()),
        None => (line, ""),
    }
}

fn no_arguments(name: &str, rest: &str) -> ShellResult<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ShellError::Parse(format!("Usage: {} (takes no arguments)", name)))
    }
}

fn path_argument(name: &str, rest: &str) -> ShellResult<String> {
    if rest.is_empty() {
        return Err(ShellError::Parse(format!("Usage: {} <path>", name)));
    }
    Ok(rest.to_string())
}

fn calendar_arguments(rest: &str) -> ShellResult<Option<CalendarMonth>> {
    let parts: Vec<&str> = rest.split_whitespace().collect();

    match parts.as_slice() {
        [] => Ok(None),
        [month, year] => {
            let month: u32 = month
                .parse()
                .map_err(|_| ShellError::Parse(CAL_USAGE.to_string()))?;
            let year: i32 = year
                .parse()
                .map_err(|_| ShellError::Parse(CAL_USAGE.to_string()))?;

            if !(1..=12).contains(&month) || !(MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&year) {
                return Err(ShellError::Parse(CAL_USAGE.to_string()));
            }

            Ok(Some(CalendarMonth { month, year }))
        }
        _ => Err(ShellError::Parse(CAL_USAGE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("ls").unwrap(), Some(Command::Ls));
        assert_eq!(Command::parse("  exit  ").unwrap(), Some(Command::Exit));
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   \t").unwrap(), None);
    }

    #[test]
    fn test_path_argument_keeps_embedded_spaces() {
        assert_eq!(
            Command::parse("cd my   documents").unwrap(),
            Some(Command::Cd("my   documents".to_string()))
        );
        assert_eq!(
            Command::parse("wc\t notes.txt").unwrap(),
            Some(Command::Wc("notes.txt".to_string()))
        );
        assert_eq!(
            Command::parse("rmdir old stuff").unwrap(),
            Some(Command::Rmdir("old stuff".to_string()))
        );
    }

    #[test]
    fn test_commands_are_case_sensitive() {
        let err = Command::parse("LS").unwrap_err();
        assert!(matches!(err, ShellError::UnknownCommand(ref name) if name == "LS"));
    }

    #[test]
    fn test_unknown_command_reports_name_only() {
        let err = Command::parse("format c:").unwrap_err();
        assert!(matches!(err, ShellError::UnknownCommand(ref name) if name == "format"));
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(Command::parse("cd"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("wc   "), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("ls -la"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("exit now"), Err(ShellError::Parse(_))));
    }

    #[test]
    fn test_calendar_arguments() {
        assert_eq!(Command::parse("cal").unwrap(), Some(Command::Cal(None)));
        assert_eq!(
            Command::parse("cal 2 2024").unwrap(),
            Some(Command::Cal(Some(CalendarMonth { month: 2, year: 2024 })))
        );

        assert!(matches!(Command::parse("cal 13 2024"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("cal 0 2024"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("cal feb 2024"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("cal 5"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("cal 5 2024 1"), Err(ShellError::Parse(_))));
        assert!(matches!(Command::parse("cal 5 10000"), Err(ShellError::Parse(_))));
    }
}
