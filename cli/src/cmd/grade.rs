use wsgrade_core::action::{self, GradeOptions};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

/// Clone, compile and test every submission of a workshop, then record the statuses
#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub workshop: String,

    /// Grade only this student (repeatable)
    #[arg(short, long = "student", value_name = "NAME")]
    pub students: Vec<String>,

    /// Number of students graded concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Time limit in seconds for each clone, compile and test run
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Grade and print, but leave the results table untouched
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = util::load_config(global_args)?.with_overrides(args.timeout, args.jobs)?;

    let opts = GradeOptions {
        workshop: args.workshop.clone(),
        students: args.students.clone(),
        dry_run: args.dry_run,
    };
    let _ = action::grade_workshop(&cfg, &opts).await?;
    Ok(())
}
