use crate::config::Config;
use crate::core::error::LainError;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config as EditorConfig, Context, EditMode, Editor, Helper};
use std::io::BufRead;
use std::path::PathBuf;

/// Where an interactive session gets its lines from.
pub trait LineSource {
    /// Returns `None` once the user is done (EOF, Ctrl-D, Ctrl-C).
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, LainError>;
}

/// Completes `/`-prefixed session commands and hints from history
pub struct ChatHelper {
    commands: Vec<String>,
    history_hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            commands,
            history_hinter: HistoryHinter {},
        }
    }
}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Some(typed) = line.get(..pos).and_then(|head| head.strip_prefix('/')) else {
            return Ok((pos, Vec::new()));
        };

        let matches = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(typed))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        // 1 is the position after '/'
        Ok((1, matches))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.history_hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {}

impl Validator for ChatHelper {}

impl Helper for ChatHelper {}

/// Line-edited terminal input with persistent input history.
pub struct TerminalInput {
    editor: Editor<ChatHelper, FileHistory>,
    history_path: PathBuf,
}

impl TerminalInput {
    pub fn new(commands: Vec<String>) -> Result<Self, LainError> {
        let config = EditorConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(config)
            .map_err(|e| LainError::Input(format!("Failed to create line editor: {}", e)))?;
        editor.set_helper(Some(ChatHelper::new(commands)));

        let history_path = Config::config_dir().join("input_history.txt");
        let _ = editor.load_history(&history_path);

        Ok(Self {
            editor,
            history_path,
        })
    }

    pub fn save_history(&mut self) -> Result<(), LainError> {
        if let Some(parent) = self.history_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LainError::Input(format!("Failed to create history directory: {}", e))
                })?;
            }
        }

        self.editor
            .save_history(&self.history_path)
            .map_err(|e| LainError::Input(format!("Failed to save history: {}", e)))
    }
}

impl LineSource for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, LainError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Plain line reader for piped input; prompts are not echoed.
pub struct PipedInput<R: BufRead> {
    reader: R,
}

impl<R: BufRead> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for PipedInput<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, LainError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}
