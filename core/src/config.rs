use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::{bail, Context as _};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

use crate::command::{CommandTemplate, Placeholder};
use crate::serdable::GlobPattern;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    /// Assignment folders, relative to the config file.
    pub folders: Vec<PathBuf>,
    pub layout: LayoutConfig,
    pub compiler: CompilerConfig,
    pub run: RunConfig,
    pub cleanup: CleanupConfig,
}

/// File and directory names inside one assignment folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub input_file: PathBuf,
    pub reference_file: PathBuf,
    pub submissions_dir: PathBuf,
    pub output_dir: PathBuf,
    pub grade_dir: PathBuf,
    /// Submission file names that are never graded.
    pub exclude: Vec<GlobPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub command: CommandTemplate,
    /// Extra environment for the compiler process only.
    pub env: BTreeMap<String, String>,
    /// Extension of produced executables; empty means none.
    pub exe_extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub timeout_ms: u64,
    pub ground_truth_timeout_ms: u64,
    /// How long each termination stage waits before escalating.
    pub kill_grace_ms: u64,
    /// Bytes of stdout or stderr kept per run; more is a runtime error.
    pub output_limit_bytes: u64,
    /// Worker slots; 0 means the number of logical CPUs.
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Leftover compiler outputs removed by the build-artifact sweep.
    pub build_artifacts: Vec<GlobPattern>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            input_file: "input.txt".into(),
            reference_file: "original_sol.c".into(),
            submissions_dir: "C".into(),
            output_dir: "output".into(),
            grade_dir: "grade".into(),
            exclude: ["original_sol.c", "example_student.c"]
                .iter()
                .filter_map(|p| GlobPattern::parse(p).ok())
                .collect(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: CommandTemplate::parse(&["cc", "-O2", "-o", "{exe}", "{src}", "-lm"])
                .expect("default compiler command is valid"),
            env: BTreeMap::new(),
            exe_extension: std::env::consts::EXE_EXTENSION.to_owned(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            ground_truth_timeout_ms: 30_000,
            kill_grace_ms: 200,
            output_limit_bytes: 8 * 1024 * 1024,
            jobs: 0,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            build_artifacts: ["*.o", "*.obj", "*.pdb", "*.ilk"]
                .iter()
                .filter_map(|p| GlobPattern::parse(p).ok())
                .collect(),
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ground_truth_timeout(&self) -> Duration {
        Duration::from_millis(self.ground_truth_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "cgrade.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).expect("example config is embedded");
        String::from_utf8_lossy(file.data.as_ref()).into_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "Not in a cgrade project dir: Cannot find '{}'",
                    Self::FILENAME
                )
            })
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    /// Directory that relative folder paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.source_config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new("."))
    }

    pub fn resolve_folder(&self, folder: impl AsRef<Path>) -> PathBuf {
        self.base_dir().join(folder)
    }

    pub fn resolved_folders(&self) -> Vec<PathBuf> {
        self.folders.iter().map(|f| self.resolve_folder(f)).collect()
    }

    /// Returns every configuration problem found, not just the first.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.folders.is_empty() {
            problems.push("No assignment folder is listed in `folders`".to_owned());
        }
        let mut seen = HashSet::new();
        for folder in &self.folders {
            if folder.as_os_str().is_empty() {
                problems.push("Empty entry in `folders`".to_owned());
                continue;
            }
            if !seen.insert(folder) {
                problems.push(format!("Folder {:?} is listed more than once", folder));
                continue;
            }
            let path = self.resolve_folder(folder);
            if !path.is_dir() {
                problems.push(format!("Folder {:?} not found", path));
            }
        }

        for ph in [Placeholder::Src, Placeholder::Exe] {
            if !self.compiler.command.mentions(ph) {
                problems.push(format!(
                    "`compiler.command` does not mention '{{{}}}': {}",
                    ph, self.compiler.command
                ));
            }
        }

        let run = &self.run;
        if run.timeout_ms == 0 {
            problems.push("`run.timeout_ms` must be positive".to_owned());
        }
        if run.ground_truth_timeout_ms == 0 {
            problems.push("`run.ground_truth_timeout_ms` must be positive".to_owned());
        }
        if run.output_limit_bytes == 0 {
            problems.push("`run.output_limit_bytes` must be positive".to_owned());
        }
        problems
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        bail!("Invalid configuration:\n  - {}", problems.join("\n  - "))
    }
}
