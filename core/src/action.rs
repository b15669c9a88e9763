pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossterm::tty::IsTty;
use error::*;

use crate::config::Config;
use crate::grading::{
    cleanup::{self, SweepStats},
    CancelToken, FolderStatus, Grader, LogProgress, ProgressReporter, RunSummary,
};
use crate::interactive::BarProgress;
use crate::style;

/// Writes the example config into `dir`. Never overwrites.
pub fn init_project(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(Config::FILENAME);
    ensure!(
        !path.exists(),
        "Already initialized: {}",
        path.to_string_lossy()
    );
    fsutil::write_with_mkdir(&path, Config::example_toml())
        .context("Failed to write example config")?;
    Ok(path)
}

/// Grades `folders` (the configured ones if empty), sweeps build artifacts
/// unless the run was cancelled, and prints the summary.
///
/// Progress bars are drawn only if `show_progress` is set and stderr is a
/// terminal; otherwise progress goes to the debug log.
pub async fn do_grade(
    mut cfg: Config,
    folders: Vec<PathBuf>,
    cancel: Arc<dyn CancelToken>,
    detailed: bool,
    show_progress: bool,
) -> Result<RunSummary> {
    if !folders.is_empty() {
        cfg.folders = folders;
    }
    cfg.validate()?;

    let folders = cfg.resolved_folders();
    log::info!("Compiler: {}", cfg.compiler.command);
    log::info!(
        "Timeout: {}ms per input ({}ms for the reference), {} worker slots",
        cfg.run.timeout_ms,
        cfg.run.ground_truth_timeout_ms,
        cfg.run.effective_jobs()
    );

    let bars = self::progress_bars(show_progress && std::io::stderr().is_tty());
    let progress: Arc<dyn ProgressReporter> = match &bars {
        Some(bars) => bars.clone(),
        None => Arc::new(LogProgress),
    };
    let grader = Grader::new(cfg, cancel, progress);
    let summary = grader.run_all(&folders).await?;
    if let Some(bars) = bars {
        bars.abandon_all();
    }

    if summary.status != FolderStatus::Cancelled {
        let cfg = grader.config();
        self::sweep_build_artifacts(&folders, cfg);
    }

    style::print_run_summary(&summary, detailed);
    Ok(summary)
}

fn progress_bars(enabled: bool) -> Option<Arc<BarProgress>> {
    enabled.then(|| Arc::new(BarProgress::new()))
}

fn sweep_build_artifacts(folders: &[PathBuf], cfg: &Config) -> SweepStats {
    cleanup::sweep_build_artifacts(folders, &cfg.cleanup.build_artifacts)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanTargets {
    pub grades: bool,
    pub outputs: bool,
    pub build: bool,
}

impl CleanTargets {
    pub fn all() -> Self {
        Self {
            grades: true,
            outputs: true,
            build: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Clears report directories (keeping the example student's files) and leftover
/// build artifacts of every configured folder.
pub fn do_clean(cfg: &Config, targets: CleanTargets) -> SweepStats {
    let folders = cfg.resolved_folders();
    let layout = &cfg.layout;
    let keep: Vec<_> = layout
        .exclude
        .iter()
        .filter_map(|p| {
            // `example_student.c` keeps `example_student.txt`.
            let stem = Path::new(p.as_str()).file_stem()?.to_string_lossy().into_owned();
            crate::serdable::GlobPattern::parse(&format!("{}.*", stem)).ok()
        })
        .collect();

    let mut stats = SweepStats::default();
    for folder in &folders {
        if targets.grades {
            stats += cleanup::clear_dir_contents(&folder.join(&layout.grade_dir), &keep);
        }
        if targets.outputs {
            stats += cleanup::clear_dir_contents(&folder.join(&layout.output_dir), &keep);
        }
    }
    if targets.build {
        stats += self::sweep_build_artifacts(&folders, cfg);
    }
    log::info!(
        "Clean finished. Deleted: {}, Kept: {}, Errors: {}",
        stats.deleted,
        stats.kept,
        stats.failed
    );
    stats
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_project(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(Config::FILENAME));
        assert!(Config::from_toml_file(path).is_ok());
        assert!(init_project(dir.path()).is_err());
    }

    #[test]
    fn no_progress_bars_unless_enabled() {
        assert!(progress_bars(false).is_none());
        assert!(progress_bars(true).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn grade_without_progress_bars() {
        use crate::command::CommandTemplate;
        use crate::grading::NeverCancel;

        let dir = tempfile::tempdir().unwrap();
        let q1 = dir.path().join("Q1");
        let echo = "#!/bin/sh\nread x; echo $x\n";
        fsutil::write_with_mkdir(q1.join("input.txt"), "1\n").unwrap();
        fsutil::write_with_mkdir(q1.join("original_sol.c"), echo).unwrap();
        fsutil::write_with_mkdir(q1.join("C/alice.c"), echo).unwrap();

        let mut cfg = Config::default();
        cfg.source_config_file = Some(dir.path().join(Config::FILENAME));
        cfg.folders = vec!["Q1".into()];
        cfg.compiler.command = CommandTemplate::parse(&[
            "/bin/sh",
            "-c",
            r#"cp "$0" "$1" && chmod +x "$1""#,
            "{src}",
            "{exe}",
        ])
        .unwrap();
        cfg.compiler.exe_extension = String::new();

        let summary = do_grade(cfg, vec![], Arc::new(NeverCancel), false, false)
            .await
            .unwrap();
        assert_eq!(summary.status, FolderStatus::Success);
        assert_eq!(
            fsutil::read_to_string(q1.join("grade/alice.txt")).unwrap(),
            "Grade: 100%\n(Calculated grade is: 100.00%)\n"
        );
    }

    #[test]
    fn clean_keeps_example_reports() {
        let dir = tempfile::tempdir().unwrap();
        let q1 = dir.path().join("Q1");
        for f in ["grade/alice.txt", "grade/example_student.txt", "output/alice.txt", "C/alice.o"] {
            fsutil::write_with_mkdir(q1.join(f), "x").unwrap();
        }
        let mut cfg = Config::default();
        cfg.folders = vec!["Q1".into()];
        cfg.source_config_file = Some(dir.path().join(Config::FILENAME));

        let stats = do_clean(
            &cfg,
            CleanTargets {
                grades: true,
                ..Default::default()
            },
        );
        assert_eq!(stats, SweepStats { deleted: 1, kept: 1, failed: 0 });
        assert!(q1.join("grade/example_student.txt").exists());
        assert!(q1.join("output/alice.txt").exists());

        let stats = do_clean(&cfg, CleanTargets::all());
        assert_eq!(stats.deleted, 2);
        assert!(!q1.join("C/alice.o").exists());
    }
}
