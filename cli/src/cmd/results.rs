use wsgrade_core::action;

use crate::util;

use super::{GlobalArgs, SubcmdResult};

/// Print the recorded statuses of a workshop
#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()]
    pub workshop: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = util::load_config(global_args)?;
    action::show_results(&cfg, &args.workshop)
}
