use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Variables available inside a compiler command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Placeholder {
    /// Path of the source file.
    Src,
    /// Path of the executable to produce.
    Exe,
    /// Directory containing the source file.
    Dir,
    /// Source file name without extension.
    Stem,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandTemplateError {
    #[error("Command must have at least a program name")]
    Empty,

    #[error("Unknown placeholder '{{{0}}}' in argument {1:?}")]
    UnknownPlaceholder(String, String),

    #[error("Unclosed brace in argument {0:?}")]
    UnclosedBrace(String),

    #[error("Unmatched '}}' in argument {0:?} (write '}}}}' for a literal brace)")]
    UnmatchedClose(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(Placeholder),
}

/// An argv template such as `["cc", "-O2", "-o", "{exe}", "{src}"]`.
///
/// `{name}` is replaced by the value of a [`Placeholder`]; `{{` and `}}` stand for
/// literal braces. Templates are checked when parsed, so rendering cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CommandTemplate {
    raw: Vec<String>,
    args: Vec<Vec<Segment>>,
}

impl CommandTemplate {
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Result<Self, CommandTemplateError> {
        if argv.is_empty() {
            return Err(CommandTemplateError::Empty);
        }
        let raw: Vec<String> = argv.iter().map(|s| s.as_ref().to_owned()).collect();
        let args = raw
            .iter()
            .map(|arg| parse_arg(arg))
            .collect::<Result<_, _>>()?;
        Ok(Self { raw, args })
    }

    pub fn mentions(&self, ph: Placeholder) -> bool {
        self.args
            .iter()
            .flatten()
            .any(|seg| *seg == Segment::Var(ph))
    }

    /// Renders the template for compiling `src` into `exe`.
    pub fn render(&self, src: &Path, exe: &Path) -> Vec<OsString> {
        let dir = src
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let stem = src.file_stem().unwrap_or(OsStr::new(""));

        self.args
            .iter()
            .map(|segments| {
                let mut arg = OsString::new();
                for seg in segments {
                    match seg {
                        Segment::Literal(s) => arg.push(s),
                        Segment::Var(Placeholder::Src) => arg.push(src),
                        Segment::Var(Placeholder::Exe) => arg.push(exe),
                        Segment::Var(Placeholder::Dir) => arg.push(dir),
                        Segment::Var(Placeholder::Stem) => arg.push(stem),
                    }
                }
                arg
            })
            .collect()
    }
}

fn parse_arg(arg: &str) -> Result<Vec<Segment>, CommandTemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = arg.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(CommandTemplateError::UnclosedBrace(arg.to_owned())),
                    }
                }
                let ph = name.parse::<Placeholder>().map_err(|_| {
                    CommandTemplateError::UnknownPlaceholder(name.clone(), arg.to_owned())
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(ph));
            }
            '}' => return Err(CommandTemplateError::UnmatchedClose(arg.to_owned())),
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl TryFrom<Vec<String>> for CommandTemplate {
    type Error = CommandTemplateError;

    fn try_from(argv: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(&argv)
    }
}

impl From<CommandTemplate> for Vec<String> {
    fn from(t: CommandTemplate) -> Self {
        t.raw
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw.join(" "))
    }
}
