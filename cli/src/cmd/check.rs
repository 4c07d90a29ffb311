use wsgrade_core::action;

use crate::util;

use super::{GlobalArgs, SubcmdResult};

/// Validate the config and the submissions/results tables
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Only check this workshop
    #[arg()]
    pub workshop: Option<String>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = util::load_config(global_args)?;
    action::check_wsgrade_dir(&cfg, args.workshop.as_deref())
}
