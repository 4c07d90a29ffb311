use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::{truncate_output, Grade, StageResult};
use crate::{
    exec::{Execution, ProcessRunner},
    status::Status,
    template::{CommandTemplate, Vars},
};

/// A freshly cloned repository. The whole temporary tree is removed on drop.
#[derive(Debug)]
pub struct ClonedRepo {
    _tmp: TempDir,
    root: PathBuf,
}

impl ClonedRepo {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub async fn clone_repo(
    url: &str,
    clone_cmd: &CommandTemplate,
    process: &ProcessRunner,
    output_limit: usize,
) -> StageResult<ClonedRepo> {
    let tmp = tempfile::Builder::new()
        .prefix("wsgrade-")
        .tempdir()
        .map_err(|e| Grade::unknown(format!("Cannot create a temporary directory: {}", e)))?;
    let dest = tmp.path().join("repo");

    let argv = {
        let dest_str = dest.to_string_lossy();
        let vars: Vars = [("url", url), ("dest", dest_str.as_ref())].into_iter().collect();
        clone_cmd.render(&vars).map_err(Grade::unknown)?
    };

    log::info!("Cloning {}...", url);
    let fail = |msg: String| Grade::new(Status::GitCloneError, msg);

    let res = process.run(&argv, tmp.path(), None).await;
    match res {
        Err(e) => Err(fail(e.to_string())),
        Ok((Execution::TimedOut, _)) => Err(fail(format!(
            "Git clone timed out after {:?}.",
            process.time_limit()
        ))),
        Ok((Execution::Finished(out), _)) if !out.success() => Err(fail(format!(
            "Failed to clone repo.\n{}",
            truncate_output(&out.stderr, output_limit)
        ))),
        Ok(_) if !dest.is_dir() => Err(fail(format!(
            "Clone command succeeded but '{}' was not created.",
            dest.display()
        ))),
        Ok(_) => Ok(ClonedRepo {
            root: dest,
            _tmp: tmp,
        }),
    }
}
