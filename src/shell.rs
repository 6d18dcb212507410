use std::io::Write;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use crate::lookup::LookupController;
use crate::postal::PostalDirectory;
use crate::record::{render_view, OutputFormat};

const PROMPT: &str = "> ";
const NOTHING_TO_FILTER: &str = "Nothing to filter, look up a postal code first.";
const HELP: &str = "\
commands:
  lookup <code>   look up a 6-digit postal code (a bare code works too)
  filter <text>   show only post offices whose name contains <text>
  filter          clear the filter
  show            print the current results again
  help            print this message
  quit            leave";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Lookup(&'a str),
    Filter(&'a str),
    Show,
    Help,
    Quit,
}

impl<'a> Command<'a> {
    /// parse one input line, `None` for a blank line
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let (word, rest) = match line.trim_start().split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line.trim(), ""),
        };
        let command = match word {
            "lookup" | "l" => Self::Lookup(rest),
            "filter" | "f" => Self::Filter(rest),
            "show" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Lookup(line),
        };
        Some(command)
    }
}

/// Interactive session: one controller, driven line by line
pub struct Session<'a, D: ?Sized> {
    controller: LookupController,
    directory: &'a D,
    format: OutputFormat,
}

impl<'a, D> Session<'a, D>
where
    D: PostalDirectory + ?Sized,
{
    pub fn new(controller: LookupController, directory: &'a D, format: OutputFormat) -> Self {
        Self {
            controller,
            directory,
            format,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &LookupController {
        &self.controller
    }

    /// read commands until `quit` or end of input
    pub async fn run<R>(&mut self, input: R, mut out: impl Write) -> color_eyre::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            debug!("shell command: {:?}", command);
            if command == Command::Quit {
                break;
            }
            self.execute(command, &mut out).await?;
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: Command<'_>, out: &mut impl Write) -> color_eyre::Result<()> {
        match command {
            Command::Lookup(code) => {
                if let Some(pending) = self.controller.begin_lookup(code) {
                    self.render(out)?;
                    let outcome = self.directory.fetch(pending.code()).await;
                    self.controller.complete_lookup(pending, outcome);
                }
            }
            Command::Filter(_) if self.controller.state().all_results().is_empty() => {
                writeln!(out, "{}", NOTHING_TO_FILTER)?;
                return Ok(());
            }
            Command::Filter(text) => self.controller.apply_filter(text),
            Command::Show => {}
            Command::Help => {
                writeln!(out, "{}", HELP)?;
                return Ok(());
            }
            Command::Quit => return Ok(()),
        }
        self.render(out)
    }

    fn render(&self, out: &mut impl Write) -> color_eyre::Result<()> {
        let mut rows = Vec::new();
        render_view(self.controller.state(), self.format, &mut rows, &mut *out)?;
        out.write_all(&rows)?;
        out.flush()?;
        Ok(())
    }
}
