use std::fmt;

/// What happened when a program was run on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Zero exit status; stdout with surrounding whitespace trimmed.
    Output(String),
    Timeout,
    /// Non-zero exit, death by signal, or failure to run at all.
    RuntimeError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum JudgeCode {
    AC,
    WA,
    TLE,
    RE,
}

impl ExecutionOutcome {
    pub fn judge(&self, expected: &str) -> JudgeCode {
        match self {
            Self::Output(actual) if actual == expected => JudgeCode::AC,
            Self::Output(_) => JudgeCode::WA,
            Self::Timeout => JudgeCode::TLE,
            Self::RuntimeError(_) => JudgeCode::RE,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Output(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Output(s) => f.write_str(s),
            Self::Timeout => f.write_str("Timeout"),
            Self::RuntimeError(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}
