use std::{path::PathBuf, process::exit};

use anyhow::Context as _;
use wsgrade_core::Config;

use crate::cmd::GlobalArgs;

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

/// `--config` when given, otherwise the nearest `wsgrade.toml` above the current dir.
pub fn load_config(global_args: &GlobalArgs) -> anyhow::Result<Config> {
    match &global_args.config {
        Some(path) => Config::from_toml_file(path.clone())
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Config::from_file_finding_in_ancestors(current_dir()),
    }
}
