//! Per-student grading pipeline: clone, detect the entry class, compile, run the tests.
//!
//! Every stage turns its own failure into a [`Grade`] and returns it through `Err`,
//! so `?` short-circuits the remaining stages and the first failure is what gets
//! recorded.

pub mod acquire;
pub mod compile;
pub mod detect;

use std::{borrow::Cow, fmt, time::Duration};

use crate::{
    config::{Config, ToolsConfig},
    exec::ProcessRunner,
    sheet::SubmissionRecord,
    status::{DisplayStatus, Status},
    template::Vars,
    testing::{CaseOutcome, CaseVerdict, ExecutionResult, TestCase, TestRunner},
};

pub type StageResult<T> = std::result::Result<T, Grade>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub passed: usize,
    pub total: usize,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.passed, self.total)
    }
}

/// Terminal outcome of one student's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub status: Status,
    /// Always starts with the internal status label, e.g. `Compile Error: ...`.
    pub details: String,
    /// Present once the program actually ran.
    pub score: Option<Score>,
}

impl Grade {
    pub fn new(status: Status, msg: impl AsRef<str>) -> Self {
        Self {
            status,
            details: format!("{}: {}", status, msg.as_ref()),
            score: None,
        }
    }

    pub fn unknown(err: impl fmt::Display) -> Self {
        Self::new(Status::UnknownError, format!("{:#}", err))
    }

    pub fn display_status(&self) -> DisplayStatus {
        self.status.display()
    }
}

/// Cuts `s` to at most `limit` bytes on a char boundary, noting how much was dropped.
pub fn truncate_output(s: &str, limit: usize) -> Cow<'_, str> {
    if s.len() <= limit {
        return Cow::Borrowed(s);
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "{}\n... (truncated {} bytes)",
        &s[..end],
        s.len() - end
    ))
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    tools: ToolsConfig,
    process: ProcessRunner,
    output_limit: usize,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Self {
        Self {
            tools: cfg.tools.clone(),
            process: ProcessRunner::new(cfg.timeout())
                .with_capture_limit(cfg.grader.capture_limit_bytes),
            output_limit: cfg.grader.output_limit_bytes,
        }
    }

    pub fn time_limit(&self) -> Duration {
        self.process.time_limit()
    }

    pub async fn grade(&self, record: &SubmissionRecord, cases: &[TestCase]) -> Grade {
        match self.try_grade(record, cases).await {
            Ok(grade) | Err(grade) => grade,
        }
    }

    async fn try_grade(&self, record: &SubmissionRecord, cases: &[TestCase]) -> StageResult<Grade> {
        let Some(url) = record.repo_url() else {
            return Err(Grade::new(Status::Absent, "No repository URL provided."));
        };

        // Dropping `repo` at the end of this function removes the clone.
        let repo = acquire::clone_repo(url, &self.tools.clone, &self.process, self.output_limit)
            .await?;

        let sources = detect::find_sources(repo.root())?;
        let entry = detect::detect_entry_point(repo.root(), &sources)?;
        log::info!(
            "[{}] Detected main class: {}",
            record.student,
            entry.class_name
        );

        log::info!(
            "[{}] Compiling Java files ({} files)...",
            record.student,
            sources.len()
        );
        compile::compile(
            repo.root(),
            &sources,
            &self.tools.compile,
            &self.process,
        )
        .await?;

        let root = repo.root().to_string_lossy();
        let vars: Vars = [("root", root.as_ref()), ("mainClass", entry.class_name.as_str())]
            .into_iter()
            .collect();
        let argv = self.tools.run.render(&vars).map_err(Grade::unknown)?;

        let no_cases_configured = cases.is_empty();
        // Without configured cases the program still has to start and exit cleanly.
        let smoke_run;
        let cases = if cases.is_empty() {
            smoke_run = [TestCase::new("", None).named("run without input")];
            &smoke_run[..]
        } else {
            cases
        };

        log::info!(
            "[{}] Running '{}' with {} test case(s)...",
            record.student,
            entry.class_name,
            cases.len()
        );
        let runner = TestRunner::new(argv, repo.root(), self.process.clone());
        let result = runner.run_all(cases).await;

        Ok(self.summarize(&entry, &result, no_cases_configured))
    }

    fn summarize(
        &self,
        entry: &detect::EntryPoint,
        result: &ExecutionResult,
        no_cases_configured: bool,
    ) -> Grade {
        let status = result.status();
        let score = Score {
            passed: result.passed(),
            total: result.total(),
        };

        let mut msg = format!(
            "{} test cases passed. (Main class: {})",
            score, entry.class_name
        );
        if no_cases_configured {
            msg += "\nNote: no test cases configured; ran the program once without input.";
        }
        if let Some(note) = entry.ambiguity_note() {
            msg += "\n";
            msg += &note;
        }
        for case in &result.cases {
            msg += "\n";
            msg += &self.describe_case(case);
        }

        Grade {
            score: Some(score),
            ..Grade::new(status, msg)
        }
    }

    fn describe_case(&self, case: &CaseOutcome) -> String {
        let head = format!(
            "[{}] {} ({}ms)",
            case.name,
            case.verdict,
            case.execution_time.as_millis()
        );
        let explanation = match case.verdict {
            CaseVerdict::Passed | CaseVerdict::OutputCaptured => None,
            CaseVerdict::Failed => Some("Output did not contain the expected text.".to_owned()),
            CaseVerdict::Timeout => Some(format!(
                "Program timed out after {:?}. It might have an infinite loop or requested more input than provided.",
                self.time_limit()
            )),
            CaseVerdict::RuntimeError => Some(match &case.error {
                Some(e) => e.clone(),
                None => "Program ran but failed with an error (e.g., wrong input format).".to_owned(),
            }),
        };

        let mut s = head;
        if let Some(e) = explanation {
            s += ": ";
            s += &e;
        }
        if !case.output.is_empty() {
            s += "\nOutput:\n";
            s += &truncate_output(&case.output, self.output_limit);
        }
        s
    }
}
