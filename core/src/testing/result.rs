use std::time::Duration;

use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CaseVerdict {
    Passed,

    #[strum(to_string = "Output Captured")]
    OutputCaptured,

    Failed,

    Timeout,

    #[strum(to_string = "Runtime Error")]
    RuntimeError,
}

impl CaseVerdict {
    /// `OutputCaptured` counts as a pass: the case had nothing to assert.
    pub fn is_pass(self) -> bool {
        matches!(self, CaseVerdict::Passed | CaseVerdict::OutputCaptured)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    pub verdict: CaseVerdict,
    /// stdout followed by stderr; empty for timeouts.
    pub output: String,
    /// Launch or communication failure, when the program never produced output.
    pub error: Option<String>,
    pub execution_time: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub cases: Vec<CaseOutcome>,
}

impl ExecutionResult {
    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.verdict.is_pass()).count()
    }

    /// None passed is `RuntimeError`, all passed is `Complete`, anything in between is
    /// `PartialComplete`. An empty result never counts as `Complete`.
    pub fn status(&self) -> Status {
        let (passed, total) = (self.passed(), self.total());
        if passed == 0 {
            Status::RuntimeError
        } else if passed == total {
            Status::Complete
        } else {
            Status::PartialComplete
        }
    }
}
