use std::path::PathBuf;
use wsgrade_core::{action, print_success};

use super::{GlobalArgs, SubcmdResult};

/// Write an example wsgrade.toml and submissions.json
#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    pub dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    action::init_wsgrade_dir(&args.dir)?;
    print_success!(
        "Successfully initialized wsgrade dir. (path: {})",
        args.dir.to_string_lossy()
    );
    Ok(())
}
