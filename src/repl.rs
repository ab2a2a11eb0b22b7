use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::core::error::{DorisError, Result};
use crate::core::prompt::Prompter;

/// Line editing and persistent input history over rustyline.
pub struct Repl {
    editor: DefaultEditor,
    history_file: PathBuf,
}

impl Repl {
    pub fn new(data_dir: &std::path::Path) -> Result<Repl> {
        let mut editor = DefaultEditor::new()
            .map_err(|e| DorisError::Input(format!("initializing line editor: {}", e)))?;

        let history_file = data_dir.join("repl_history.txt");
        if history_file.exists() {
            editor.load_history(&history_file).ok();
        }

        Ok(Repl {
            editor,
            history_file,
        })
    }

    /// Reads the next query. `Ok(None)` means "no input this round" (empty
    /// line or Ctrl-C); Ctrl-D ends the session.
    pub fn read_query(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                self.editor.add_history_entry(trimmed).ok();
                Ok(Some(trimmed.to_string()))
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                Ok(None)
            }
            Err(ReadlineError::Eof) => Err(DorisError::Input("eof".to_string())),
            Err(e) => Err(DorisError::Input(format!("reading query: {}", e))),
        }
    }

    pub fn save_history(&mut self) -> Result<()> {
        self.editor
            .save_history(&self.history_file)
            .map_err(|e| DorisError::Input(format!("saving input history: {}", e)))
    }
}

/// Disambiguation answers come through the same editor. Ctrl-C and Ctrl-D
/// read as empty lines, which the prompt layer treats as a skip or decline.
impl Prompter for Repl {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(String::new()),
            Err(e) => Err(DorisError::Input(format!("reading answer: {}", e))),
        }
    }
}
