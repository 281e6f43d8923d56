//! Command descriptions and the `:`-separated invocation parser.

use crate::error::{Error, Result, UsageError};
use std::ffi::CString;
use std::fmt;

pub const SEPARATOR: &str = ":";

/// A program name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    words: Vec<String>,
}

impl Command {
    /// Returns `None` for an empty word list; a command always has a program.
    pub fn new(words: Vec<String>) -> Option<Self> {
        if words.is_empty() {
            None
        } else {
            Some(Self { words })
        }
    }

    pub fn program(&self) -> &str {
        &self.words[0]
    }

    pub fn args(&self) -> &[String] {
        &self.words[1..]
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// NUL-terminated argv for `execvp`. Built before forking so the child
    /// does no conversion work.
    pub fn to_argv(&self) -> Result<Vec<CString>> {
        self.words
            .iter()
            .map(|w| CString::new(w.as_bytes()).map_err(|_| Error::Argument(w.clone())))
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}

/// One head command and the leg commands its output is copied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub head: Command,
    pub legs: Vec<Command>,
}

impl Pipeline {
    /// Splits `words` on the first two `:` tokens into head, leg1 and leg2.
    /// Any later `:` is an ordinary argument of the third command.
    pub fn parse<S: AsRef<str>>(words: &[S]) -> std::result::Result<Self, UsageError> {
        if words.is_empty() {
            return Err(UsageError::NoArguments);
        }

        let mut rest = words.iter().map(|w| w.as_ref());
        let head = take_until_separator(&mut rest).ok_or(UsageError::OnlyOneCommand)?;
        let leg1 = take_until_separator(&mut rest).ok_or(UsageError::OnlyTwoCommands)?;
        let leg2: Vec<String> = rest.map(str::to_owned).collect();

        let head = Command::new(head).ok_or(UsageError::EmptyCommand { position: 1 })?;
        let leg1 = Command::new(leg1).ok_or(UsageError::EmptyCommand { position: 2 })?;
        let leg2 = Command::new(leg2).ok_or(UsageError::MissingThirdCommand)?;

        Ok(Self {
            head,
            legs: vec![leg1, leg2],
        })
    }
}

/// Collects words up to the next separator, consuming it. `None` if the
/// iterator ran out before a separator was seen.
fn take_until_separator<'a, I>(words: &mut I) -> Option<Vec<String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut out = Vec::new();
    for word in words.by_ref() {
        if word == SEPARATOR {
            return Some(out);
        }
        out.push(word.to_owned());
    }
    None
}
