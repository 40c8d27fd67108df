//! Terminal input and colored rendering of agent events

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use colored::Colorize;
use filepilot_agent::{AgentEvent, Console, UserInput};
use tokio::sync::mpsc;

/// Stdin lines read on a dedicated thread.
///
/// The blocking read never runs on the runtime, so an interrupted session
/// can exit while the terminal still has stdin open.
pub struct StdinLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl StdinLines {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(1);

        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(Self { rx })
    }
}

#[async_trait]
impl UserInput for StdinLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.rx.recv().await.transpose()
    }
}

/// Chat on stdout, failures on stderr
pub struct TerminalConsole {
    out: io::Stdout,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn prompt(&mut self) {
        let _ = write!(self.out, "{}: ", "You".bright_blue());
        let _ = self.out.flush();
    }

    fn emit(&mut self, event: AgentEvent<'_>) {
        match event {
            AgentEvent::Reply(text) => {
                let _ = writeln!(self.out, "{}: {}", "AI".bright_yellow(), text);
            }
            AgentEvent::ToolCall { name, arguments } => {
                let _ = writeln!(
                    self.out,
                    "{}: {}({})",
                    "Tool Call".bright_green(),
                    name,
                    arguments
                );
            }
            AgentEvent::CompletionFailed { error, attempt } => {
                eprintln!(
                    "{} attempt {} failed ({:?}): {}",
                    "✗".red(),
                    attempt,
                    error.kind(),
                    error
                );
            }
            AgentEvent::Retrying { delay } => {
                eprintln!("  {}", format!("retrying in {:?}", delay).dimmed());
            }
            AgentEvent::TurnAbandoned { attempts } => {
                eprintln!(
                    "{} giving up after {} attempt(s), enter another message",
                    "✗".red(),
                    attempts
                );
            }
        }
        let _ = self.out.flush();
    }
}
