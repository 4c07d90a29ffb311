use std::path::{Path, PathBuf};

use super::{Grade, StageResult};
use crate::{
    exec::{Execution, ProcessRunner},
    status::Status,
    template::{CommandTemplate, Vars},
};

/// Compiles every source at once from the project root.
///
/// `sources` are relative to `root`, so the package directory layout is preserved and
/// the class files end up under `root` (given `-d #{root}` in the template).
///
/// Diagnostics are recorded verbatim, bounded only by the runner's capture limit.
pub async fn compile(
    root: &Path,
    sources: &[PathBuf],
    compile_cmd: &CommandTemplate,
    process: &ProcessRunner,
) -> StageResult<()> {
    let root_str = root.to_string_lossy();
    let vars: Vars = [("root", root_str.as_ref())].into_iter().collect();
    let mut argv = compile_cmd.render(&vars).map_err(Grade::unknown)?;
    argv.extend(sources.iter().map(|p| p.to_string_lossy().into_owned()));

    let fail = |msg: String| Grade::new(Status::CompileError, msg);

    match process.run(&argv, root, None).await {
        Err(e) => Err(fail(e.to_string())),
        Ok((Execution::TimedOut, _)) => Err(fail(format!(
            "Compiler timed out after {:?}.",
            process.time_limit()
        ))),
        Ok((Execution::Finished(out), _)) if !out.success() => {
            // javac reports on stderr; fall back to stdout for compilers that don't.
            let diagnostics = if out.stderr.trim().is_empty() {
                &out.stdout
            } else {
                &out.stderr
            };
            Err(fail(format!("Code did not compile.\n{}", diagnostics)))
        }
        Ok((Execution::Finished(out), elapsed)) => {
            log::debug!(
                "Compiled {} file(s) in {}ms{}",
                sources.len(),
                elapsed.as_millis(),
                if out.stderr.is_empty() { "" } else { " (with warnings)" }
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cmd(argv: &[&str]) -> CommandTemplate {
        CommandTemplate::parse(argv).unwrap()
    }

    #[tokio::test]
    async fn sources_are_passed_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![PathBuf::from("src/app/Main.java"), PathBuf::from("src/app/Util.java")];
        // Records its arguments and working directory instead of compiling.
        let fake_javac = cmd(&["sh", "-c", r#"echo "$(pwd -P)|$*" > args.txt"#, "javac", "-d", "#{root}"]);

        compile(dir.path(), &sources, &fake_javac, &ProcessRunner::default())
            .await
            .unwrap();

        let recorded = fsutil::read_to_string(dir.path().join("args.txt")).unwrap();
        let (pwd, args) = recorded.trim_end().split_once('|').unwrap();
        assert_eq!(
            std::fs::canonicalize(pwd).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
        assert_eq!(
            args,
            format!(
                "-d {} src/app/Main.java src/app/Util.java",
                dir.path().display()
            )
        );
    }

    #[tokio::test]
    async fn stdout_diagnostics_are_used_when_stderr_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(
            dir.path(),
            &[PathBuf::from("Main.java")],
            &cmd(&["sh", "-c", "echo 'Main.java:1: error'; exit 2"]),
            &ProcessRunner::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            Grade::new(Status::CompileError, "Code did not compile.\nMain.java:1: error\n")
        );
    }

    #[tokio::test]
    async fn long_diagnostics_are_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(
            dir.path(),
            &[PathBuf::from("Main.java")],
            &cmd(&["sh", "-c", "for i in $(seq 1 300); do echo \"Main.java:$i: error: cannot find symbol\" >&2; done; exit 1"]),
            &ProcessRunner::default(),
        )
        .await
        .unwrap_err();

        let expected: String = (1..=300)
            .map(|i| format!("Main.java:{}: error: cannot find symbol\n", i))
            .collect();
        assert_eq!(
            err.details,
            format!("Compile Error: Code did not compile.\n{}", expected)
        );
    }

    #[tokio::test]
    async fn subsecond_timeout_is_reported_precisely() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(
            dir.path(),
            &[PathBuf::from("Main.java")],
            &cmd(&["sleep", "5"]),
            &ProcessRunner::new(std::time::Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            Grade::new(Status::CompileError, "Compiler timed out after 200ms.")
        );
    }

    #[tokio::test]
    async fn missing_compiler_is_a_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(
            dir.path(),
            &[PathBuf::from("Main.java")],
            &cmd(&["surely-not-javac-42"]),
            &ProcessRunner::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.details,
            "Compile Error: Command 'surely-not-javac-42' not found. Is it in your PATH?"
        );
    }
}
