pub mod check;
pub mod grade;
pub mod init;
pub mod results;

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file to use instead of searching for wsgrade.toml in ancestor dirs
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("g"))]
    Grade(grade::Args),

    Check(check::Args),
    Results(results::Args),
    Init(init::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Grade(args) => grade::exec(args, self).await,
            Check(args) => check::exec(args, self),
            Results(args) => results::exec(args, self),
            Init(args) => init::exec(args, self),
        }
    }
}
