//! Interactive prompts.
//!
//! [`Prompter`] is the seam between the configuration menu and the
//! terminal. [`LinePrompter`] reads numbered answers line by line from any
//! `BufRead`, so the same code drives the terminal and scripted tests.

use std::env;
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::PipelineError;

/// An entry of a checkbox prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub name: String,
    pub checked: bool,
}

impl Choice {
    pub fn new(name: impl Into<String>, checked: bool) -> Self {
        Self {
            name: name.into(),
            checked,
        }
    }
}

/// Questions the interactive layer can ask.
///
/// End of input is reported as [`PipelineError::InputClosed`].
pub trait Prompter {
    /// Pick one of `choices`, returning its index. An empty answer picks
    /// `default`.
    fn select(&mut self, message: &str, choices: &[&str], default: usize) -> Result<usize>;

    /// Free text; an empty answer yields `default` (or an empty string).
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String>;

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;

    /// Pick any number of `choices`, returning the chosen names in order.
    fn checkbox(&mut self, message: &str, choices: &[Choice]) -> Result<Vec<String>>;

    /// Open `path` in the user's editor and wait for it to exit.
    fn edit(&mut self, path: &Path) -> Result<()>;
}

/// Line based prompter over a reader/writer pair.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
    editor: Option<String>,
}

impl LinePrompter<StdinLock<'static>, Stdout> {
    /// Prompter on the process terminal.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            editor: None,
        }
    }

    /// Use `editor` instead of `$VISUAL`/`$EDITOR`.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}").context("write prompt")?;
        self.output.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read answer")?;
        if read == 0 {
            return Err(PipelineError::InputClosed.into());
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{line}").context("write prompt")
    }

    fn editor_command(&self) -> String {
        self.editor
            .clone()
            .or_else(|| env::var("VISUAL").ok())
            .or_else(|| env::var("EDITOR").ok())
            .filter(|editor| !editor.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn select(&mut self, message: &str, choices: &[&str], default: usize) -> Result<usize> {
        self.say(message)?;
        for (idx, choice) in choices.iter().enumerate() {
            let marker = if idx == default { " (default)" } else { "" };
            self.say(&format!("  {}) {choice}{marker}", idx + 1))?;
        }
        loop {
            let answer = self.ask("> ")?;
            if answer.is_empty() {
                return Ok(default);
            }
            if let Ok(number) = answer.parse::<usize>()
                && (1..=choices.len()).contains(&number)
            {
                return Ok(number - 1);
            }
            if let Some(idx) = choices
                .iter()
                .position(|choice| choice.eq_ignore_ascii_case(&answer))
            {
                return Ok(idx);
            }
            self.say(&format!("Please answer 1-{} or a label.", choices.len()))?;
        }
    }

    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        let prompt = match default {
            Some(default) => format!("{message} [{default}] "),
            None => format!("{message} "),
        };
        let answer = self.ask(&prompt)?;
        if answer.is_empty() {
            return Ok(default.unwrap_or_default().to_string());
        }
        Ok(answer)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        loop {
            let answer = self.ask(&format!("{message} {hint} "))?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.")?,
            }
        }
    }

    fn checkbox(&mut self, message: &str, choices: &[Choice]) -> Result<Vec<String>> {
        self.say(message)?;
        for (idx, choice) in choices.iter().enumerate() {
            let mark = if choice.checked { "x" } else { " " };
            self.say(&format!("  {}) [{mark}] {}", idx + 1, choice.name))?;
        }
        'ask: loop {
            let answer = self.ask("numbers (empty keeps [x], '-' selects none) > ")?;
            if answer.is_empty() {
                return Ok(choices
                    .iter()
                    .filter(|choice| choice.checked)
                    .map(|choice| choice.name.clone())
                    .collect());
            }
            if answer == "-" {
                return Ok(Vec::new());
            }
            let mut picked = vec![false; choices.len()];
            for token in answer.split(|c: char| c == ',' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                match token.parse::<usize>() {
                    Ok(number) if (1..=choices.len()).contains(&number) => {
                        picked[number - 1] = true;
                    }
                    _ => {
                        self.say(&format!("'{token}' is not between 1 and {}.", choices.len()))?;
                        continue 'ask;
                    }
                }
            }
            return Ok(choices
                .iter()
                .zip(picked)
                .filter(|(_, picked)| *picked)
                .map(|(choice, _)| choice.name.clone())
                .collect());
        }
    }

    fn edit(&mut self, path: &Path) -> Result<()> {
        let editor = self.editor_command();
        let mut parts = editor.split_whitespace();
        let program = parts.next().unwrap_or("vi").to_string();
        info!(file = %path.display(), editor = %editor, "opening editor");
        let status = Command::new(&program)
            .args(parts)
            .arg(path)
            .status()
            .with_context(|| format!("spawn editor {editor}"))?;
        debug!(exit_code = ?status.code(), "editor finished");
        if !status.success() {
            return Err(PipelineError::Command {
                program,
                code: status.code(),
                stderr: String::new(),
            })
            .with_context(|| format!("edit {}", path.display()));
        }
        Ok(())
    }
}
