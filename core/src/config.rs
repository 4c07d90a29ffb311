use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context as _};
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::exec::ProcessRunner;
use crate::template::CommandTemplate;
use crate::testing::TestCase;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    #[serde(default)]
    pub grader: GraderConfig,
    pub roster: RosterConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub workshops: BTreeMap<String, WorkshopConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraderConfig {
    #[serde(default = "GraderConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "GraderConfig::default_jobs")]
    pub jobs: usize,
    #[serde(default = "GraderConfig::default_output_limit_bytes")]
    pub output_limit_bytes: usize,
    #[serde(default = "GraderConfig::default_capture_limit_bytes")]
    pub capture_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterConfig {
    pub submissions: PathBuf,
    pub results: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolsConfig {
    pub clone: CommandTemplate,
    pub compile: CommandTemplate,
    pub run: CommandTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkshopConfig {
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

fn asset_str(name: &str) -> String {
    let file = Asset::get(name).unwrap_or_else(|| panic!("Missing embedded asset '{}'", name));
    String::from_utf8_lossy(file.data.as_ref()).into_owned()
}

impl GraderConfig {
    fn default_timeout_secs() -> u64 {
        15
    }

    fn default_jobs() -> usize {
        1
    }

    fn default_output_limit_bytes() -> usize {
        4000
    }

    fn default_capture_limit_bytes() -> usize {
        ProcessRunner::DEFAULT_CAPTURE_LIMIT
    }
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            jobs: Self::default_jobs(),
            output_limit_bytes: Self::default_output_limit_bytes(),
            capture_limit_bytes: Self::default_capture_limit_bytes(),
        }
    }
}

impl ToolsConfig {
    pub const CLONE_VARS: &'static [&'static str] = &["url", "dest"];
    pub const COMPILE_VARS: &'static [&'static str] = &["root"];
    pub const RUN_VARS: &'static [&'static str] = &["root", "mainClass"];

    pub fn validate(&self) -> anyhow::Result<()> {
        self.clone
            .ensure_vars_within(Self::CLONE_VARS)
            .context("Invalid `tools.clone`")?;
        self.compile
            .ensure_vars_within(Self::COMPILE_VARS)
            .context("Invalid `tools.compile`")?;
        self.run
            .ensure_vars_within(Self::RUN_VARS)
            .context("Invalid `tools.run`")?;
        Ok(())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        // The literals below are valid templates.
        let parse = |argv: &[&str]| CommandTemplate::parse(argv).unwrap();
        Self {
            clone: parse(&["git", "clone", "--quiet", "#{url}", "#{dest}"]),
            compile: parse(&["javac", "-d", "#{root}"]),
            run: parse(&["java", "-cp", "#{root}", "#{mainClass}"]),
        }
    }
}

impl Config {
    pub const FILENAME: &str = "wsgrade.toml";

    pub fn example_toml() -> String {
        asset_str(Self::FILENAME)
    }

    pub fn example_submissions_json() -> String {
        asset_str("submissions.json")
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;

        if let Some(base) = filepath.parent() {
            cfg.roster.submissions = base.join(&cfg.roster.submissions);
            cfg.roster.results = base.join(&cfg.roster.results);
        }
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file in ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "Not in a wsgrade dir: Cannot find '{}' (try `wsgrade init`)",
                    Self::FILENAME
                )
            })
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.grader.timeout_secs > 0, "`grader.timeout_secs` must be positive");
        ensure!(self.grader.jobs > 0, "`grader.jobs` must be at least 1");
        ensure!(
            self.grader.capture_limit_bytes > 0,
            "`grader.capture_limit_bytes` must be positive"
        );
        self.tools.validate()
    }

    pub fn with_overrides(mut self, timeout_secs: Option<u64>, jobs: Option<usize>) -> anyhow::Result<Self> {
        if let Some(t) = timeout_secs {
            self.grader.timeout_secs = t;
        }
        if let Some(j) = jobs {
            self.grader.jobs = j;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.grader.timeout_secs)
    }

    pub fn workshop_cases(&self, workshop: &str) -> anyhow::Result<&[TestCase]> {
        self.workshops
            .get(workshop.trim())
            .map(|w| w.cases.as_slice())
            .with_context(|| {
                let known: Vec<_> = self.workshops.keys().map(String::as_str).collect();
                format!(
                    "Workshop '{}' is not configured (configured: {})",
                    workshop,
                    if known.is_empty() {
                        "none".to_owned()
                    } else {
                        known.join(", ")
                    }
                )
            })
    }
}
