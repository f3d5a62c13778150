use std::fmt;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::protocol::{ShellError, ShellResult};
use crate::sandbox::{Outcome, SandboxedShell};

/// Why the read/dispatch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exit,
    EndOfInput,
    Signal,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exit => write!(f, "exit command"),
            Termination::EndOfInput => write!(f, "end of input"),
            Termination::Signal => write!(f, "signal"),
        }
    }
}

/// Line-oriented front end: prints the prompt, reads a line, dispatches it
/// and prints the result until the session ends.
pub struct Terminal {
    shell: SandboxedShell,
}

impl Terminal {
    pub fn new(shell: SandboxedShell) -> Self {
        Self { shell }
    }

    /// Runs the session to completion and tears the sandbox down on every
    /// path out of the loop, errors included.
    ///
    /// `shutdown` is only polled while waiting for input, so a command that
    /// has started always runs to completion.
    pub async fn run<R, W, S>(mut self, input: R, output: &mut W, shutdown: S) -> ShellResult<Termination>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        info!(
            session_id = %self.shell.session().id(),
            hostname = %self.shell.hostname(),
            "Session started"
        );

        let result = self.terminal_loop(input, output, shutdown).await;

        let reason = match &result {
            Ok(termination) => termination.to_string(),
            Err(e) => format!("error: {}", e),
        };

        if let Err(e) = self.shell.close(&reason) {
            error!(error = %e, "Sandbox teardown failed");
        }

        result
    }

    async fn terminal_loop<R, W, S>(&mut self, input: R, output: &mut W, shutdown: S) -> ShellResult<Termination>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = input.lines();
        tokio::pin!(shutdown);

        loop {
            let prompt = self.shell.get_shell_prompt();
            write_text(output, &prompt).await?;

            let line = tokio::select! {
                line = lines.next_line() => line
                    .map_err(|e| ShellError::io("Failed to read input", e))?,
                _ = &mut shutdown => {
                    write_text(output, "\n").await?;
                    return Ok(Termination::Signal);
                }
            };

            let line = match line {
                Some(line) => line,
                None => {
                    write_text(output, "\n").await?;
                    return Ok(Termination::EndOfInput);
                }
            };

            match self.shell.dispatch(&line) {
                Ok(Outcome::Output(text)) => {
                    write_text(output, &text).await?;
                    if !text.ends_with('\n') {
                        write_text(output, "\n").await?;
                    }
                }
                Ok(Outcome::Silent) => {}
                Ok(Outcome::Exit) => return Ok(Termination::Exit),
                Err(e) => {
                    debug!(error = %e, kind = e.kind(), "Command failed");
                    write_text(output, &format!("Error: {}\n", e)).await?;
                }
            }
        }
    }
}

async fn write_text<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> ShellResult<()> {
    output.write_all(text.as_bytes()).await
        .map_err(|e| ShellError::io("Failed to write output", e))?;
    output.flush().await
        .map_err(|e| ShellError::io("Failed to flush output", e))
}
