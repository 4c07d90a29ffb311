use serde::{Deserialize, Serialize};

use super::result::CaseVerdict;

/// Scripted stdin plus an optional fragment the output has to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub name: Option<String>,
    pub input: String,
    #[serde(default)]
    pub expected: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected: Option<&str>) -> Self {
        Self {
            name: None,
            input: input.into(),
            expected: expected.map(str::to_owned),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `name` if configured, otherwise the 1-based position (`#1`, `#2`, ...).
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", index + 1),
        }
    }

    /// Judges the output of a run that exited normally.
    ///
    /// Only the ends of `output` are trimmed; the expected fragment has to appear
    /// verbatim, case and inner whitespace included.
    pub fn judge(&self, output: &str) -> CaseVerdict {
        match &self.expected {
            None => CaseVerdict::OutputCaptured,
            Some(expected) if output.trim().contains(expected.as_str()) => CaseVerdict::Passed,
            Some(_) => CaseVerdict::Failed,
        }
    }
}
