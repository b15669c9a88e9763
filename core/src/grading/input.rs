use std::{fmt, path::Path};

/// One line of an assignment's input file, fed to a program's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestInput(String);

impl TestInput {
    /// Strips the characters that must never reach a submission's stdin.
    pub fn sanitized(raw: &str) -> Self {
        Self(raw.chars().filter(|c| !matches!(c, '"' | '\'' | ';')).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestInput {
    fn from(s: &str) -> Self {
        Self::sanitized(s)
    }
}

pub fn parse_inputs(text: &str) -> Vec<TestInput> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(TestInput::sanitized)
        .collect()
}

/// Loads the inputs of one assignment. Never fails: an unreadable file is
/// logged and treated as having no inputs.
pub fn load_inputs(input_file: impl AsRef<Path>) -> Vec<TestInput> {
    let input_file = input_file.as_ref();
    match fsutil::read_to_string(input_file) {
        Ok(text) => {
            let inputs = parse_inputs(&text);
            log::info!(
                "Loaded {} sanitized inputs from {}",
                inputs.len(),
                input_file.to_string_lossy()
            );
            inputs
        }
        Err(e) => {
            log::error!("Failed to read inputs: {:#}", e);
            Vec::new()
        }
    }
}
