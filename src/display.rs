use crate::core::error::LainError;
use console::style;
use std::io::{self, Write};

pub const REPLY_PREFIX: &str = "lain> ";

/// Renders streamed replies for one session.
///
/// The prefix goes in front of the first fragment of every reply; the state
/// is reset by `begin_reply` rather than kept process-wide.
pub struct Renderer<W: Write> {
    out: W,
    at_reply_start: bool,
    wrote_fragment: bool,
}

impl Renderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            at_reply_start: true,
            wrote_fragment: false,
        }
    }

    pub fn begin_reply(&mut self) {
        self.at_reply_start = true;
        self.wrote_fragment = false;
    }

    pub fn fragment(&mut self, text: &str) -> Result<(), LainError> {
        if self.at_reply_start {
            self.at_reply_start = false;
            write!(self.out, "{}", style(REPLY_PREFIX).bold().magenta())?;
        }
        write!(self.out, "{}", text)?;
        self.out.flush()?;
        self.wrote_fragment = true;
        Ok(())
    }

    pub fn error(&mut self, err: &LainError) {
        if self.wrote_fragment {
            let _ = writeln!(self.out);
            self.wrote_fragment = false;
        }
        let _ = writeln!(self.out, "{}", style(format!("Error: {}", err)).red());
        let _ = self.out.flush();
    }

    pub fn end_reply(&mut self) -> Result<(), LainError> {
        if self.wrote_fragment {
            writeln!(self.out)?;
            self.out.flush()?;
            self.wrote_fragment = false;
        }
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> Result<(), LainError> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn display_usage(commands: &[(String, &'static str)]) {
    println!("{}", style("Usage: lain <command> [args...]").bold());
    display_command_list(commands);
}

pub fn display_command_list(commands: &[(String, &'static str)]) {
    println!("Available commands:");
    let width = commands.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, help) in commands {
        println!(" - {:<width$}  {}", style(name).cyan(), help, width = width);
    }
}

pub fn display_error(err: &LainError) {
    eprintln!("{} {}", style("✗").bold().red(), style(err).red());
}

pub fn display_status(message: &str) {
    println!("{}", style(message).dim());
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").bold().green(), message);
}
