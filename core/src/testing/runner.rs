use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use super::{result::*, testcase::*};
use crate::exec::{Execution, ProcessRunner};

/// Runs an already-compiled program against test cases, one process per case.
#[derive(Debug, Clone)]
pub struct TestRunner {
    argv: Vec<String>,
    cwd: PathBuf,
    process: ProcessRunner,
}

impl TestRunner {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>, process: ProcessRunner) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
            process,
        }
    }

    pub fn get_command(&self) -> &[String] {
        &self.argv
    }

    pub fn get_cwd(&self) -> &Path {
        &self.cwd
    }

    pub async fn run(&self, index: usize, testcase: &TestCase) -> CaseOutcome {
        let name = testcase.label(index);
        let res = self
            .process
            .run(&self.argv, &self.cwd, Some(testcase.input.as_bytes()))
            .await;

        let (verdict, output, error, execution_time) = match res {
            Err(e) => {
                log::warn!("Testcase {}: {}", name, e);
                (CaseVerdict::RuntimeError, String::new(), Some(e.to_string()), Duration::ZERO)
            }
            Ok((Execution::TimedOut, elapsed)) => (CaseVerdict::Timeout, String::new(), None, elapsed),
            Ok((Execution::Finished(out), elapsed)) => {
                let mut combined = out.combined();
                let verdict = if out.success() {
                    testcase.judge(&combined)
                } else {
                    CaseVerdict::RuntimeError
                };
                if out.is_truncated() {
                    combined += &format!("\n... (discarded {} bytes of further output)", out.discarded_bytes);
                }
                (verdict, combined, None, elapsed)
            }
        };

        log::debug!("Testcase {} ... {} [{}ms]", name, verdict, execution_time.as_millis());
        CaseOutcome {
            name,
            verdict,
            output,
            error,
            execution_time,
        }
    }

    pub async fn run_all(&self, testcases: &[TestCase]) -> ExecutionResult {
        let mut cases = Vec::with_capacity(testcases.len());
        for (i, t) in testcases.iter().enumerate() {
            cases.push(self.run(i, t).await);
        }
        ExecutionResult { cases }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::Status;

    struct X {
        input: &'static str,
        expected: Option<&'static str>,
        script: &'static str,
        want_verdict: CaseVerdict,
        want_output: &'static str,
    }

    fn runner(script: &str, limit_ms: u64) -> TestRunner {
        TestRunner::new(
            vec!["sh".into(), "-c".into(), script.into()],
            std::env::temp_dir(),
            ProcessRunner::new(Duration::from_millis(limit_ms)),
        )
    }

    async fn run_test(x: X) {
        let t = TestCase::new(x.input, x.expected);
        let res = dbg!(runner(x.script, 500).run(0, &t).await);
        assert_eq!(res.name, "#1");
        assert_eq!(res.verdict, x.want_verdict);
        assert_eq!(res.output, x.want_output);
    }

    #[tokio::test]
    async fn echo_of_first_input_should_pass() {
        run_test(X {
            input: "25.0\n0.0\n",
            expected: Some("25.0"),
            script: r#"read a; echo "$a""#,
            want_verdict: CaseVerdict::Passed,
            want_output: "25.0\n",
        })
        .await;
    }

    #[tokio::test]
    async fn stderr_counts_as_output() {
        run_test(X {
            input: "",
            expected: Some("Exception"),
            script: r#"echo "Exception in thread main" >&2"#,
            want_verdict: CaseVerdict::Passed,
            want_output: "Exception in thread main\n",
        })
        .await;
    }

    #[tokio::test]
    async fn should_fail_on_missing_fragment() {
        run_test(X {
            input: "3\n",
            expected: Some("Result: 9"),
            script: r#"read a; echo "Result: $a""#,
            want_verdict: CaseVerdict::Failed,
            want_output: "Result: 3\n",
        })
        .await;
    }

    #[tokio::test]
    async fn should_be_runtime_error_even_if_output_matches() {
        run_test(X {
            input: "",
            expected: Some("ok"),
            script: "echo ok; exit 1",
            want_verdict: CaseVerdict::RuntimeError,
            want_output: "ok\n",
        })
        .await;
    }

    #[tokio::test]
    async fn should_time_out_when_input_runs_dry() {
        run_test(X {
            input: "1\n",
            expected: Some("1"),
            script: "read a; read b; sleep 5",
            want_verdict: CaseVerdict::Timeout,
            want_output: "",
        })
        .await;
    }

    #[tokio::test]
    async fn launch_failure_is_runtime_error() {
        let r = TestRunner::new(
            vec!["surely-not-a-jvm-42".into()],
            std::env::temp_dir(),
            ProcessRunner::default(),
        );
        let res = r.run(0, &TestCase::new("", None)).await;
        assert_eq!(res.verdict, CaseVerdict::RuntimeError);
        assert!(res.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn flooding_output_is_capped_and_marked() {
        let r = TestRunner::new(
            vec!["sh".into(), "-c".into(), "echo 'Enter a number:'; yes | head -c 100000".into()],
            std::env::temp_dir(),
            ProcessRunner::new(Duration::from_secs(5)).with_capture_limit(64),
        );
        let res = r.run(0, &TestCase::new("", Some("Enter a number:"))).await;
        assert_eq!(res.verdict, CaseVerdict::Passed);
        assert!(res.output.starts_with("Enter a number:\ny\n"));
        assert!(
            res.output.ends_with("\n... (discarded 99952 bytes of further output)"),
            "{}",
            res.output
        );
    }

    #[tokio::test]
    async fn run_all_aggregates() {
        let cases = vec![
            TestCase::new("2\n", Some("4")),
            TestCase::new("3\n", Some("9")),
            TestCase::new("5\n", None),
        ];
        let r = runner(r#"read a; echo $((a * 2))"#, 1000);
        let res = r.run_all(&cases).await;

        let verdicts: Vec<_> = res.cases.iter().map(|c| c.verdict).collect();
        assert_eq!(
            verdicts,
            vec![CaseVerdict::Passed, CaseVerdict::Failed, CaseVerdict::OutputCaptured]
        );
        assert_eq!(res.passed(), 2);
        assert_eq!(res.status(), Status::PartialComplete);
    }
}
