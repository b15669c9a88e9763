use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task::JoinSet;

use super::{
    cleanup::{self, ArtifactGuard},
    compiler::{self, Compiler},
    control::{CancelToken, ProgressReporter},
    executor::Executor,
    ground_truth::{self, GroundTruthEntry, GroundTruthError},
    input,
    pool::WorkerPool,
    worker::{self, ReportDirs, SubmissionResult},
};
use crate::{
    config::{Config, LayoutConfig},
    serdable::GlobPattern,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FolderStatus {
    Success,
    Warning,
    Error,
    Cancelled,
}

/// Success only if every folder succeeded; otherwise cancelled if any folder was
/// cancelled, warning if at least one succeeded, error if none did.
pub fn overall_status(statuses: &[FolderStatus]) -> FolderStatus {
    use FolderStatus::*;
    if statuses.iter().all(|&s| s == Success) {
        Success
    } else if statuses.contains(&Cancelled) {
        Cancelled
    } else if statuses.contains(&Success) {
        Warning
    } else {
        Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FolderStage {
    Setup,
    Inputs,
    GroundTruth,
    Compile,
    Execute,
}

/// Conditions that end a folder's run early.
#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    #[error("No inputs found in {}", .0.to_string_lossy())]
    NoInputs(PathBuf),

    #[error(transparent)]
    GroundTruth(#[from] GroundTruthError),

    #[error("Submissions directory not found: {}", .0.to_string_lossy())]
    NoSubmissionsDir(PathBuf),

    #[error("No submissions found in {}", .0.to_string_lossy())]
    NoSubmissions(PathBuf),

    #[error("No submission compiled successfully")]
    NothingCompiled,

    #[error("Cannot prepare folder")]
    Prepare(#[source] fsutil::Error),
}

impl FolderError {
    pub fn status(&self) -> FolderStatus {
        match self {
            Self::NoInputs(_) | Self::NoSubmissions(_) => FolderStatus::Warning,
            _ => FolderStatus::Error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Folder not found: {}", .0.to_string_lossy())]
pub struct MissingFolder(pub PathBuf);

enum Stop {
    Cancelled(FolderStage),
    Failed(FolderError),
}

impl From<FolderError> for Stop {
    fn from(e: FolderError) -> Self {
        Self::Failed(e)
    }
}

impl From<GroundTruthError> for Stop {
    fn from(e: GroundTruthError) -> Self {
        Self::Failed(e.into())
    }
}

#[derive(Debug)]
pub struct FolderOutcome {
    pub folder: PathBuf,
    pub status: FolderStatus,
    pub error: Option<FolderError>,
    /// The stage during which cancellation was observed.
    pub cancelled_at: Option<FolderStage>,
    /// Submissions graded during this run, sorted by id. Matches the grade
    /// files on disk, also when the run was cancelled.
    pub results: Vec<SubmissionResult>,
}

impl FolderOutcome {
    pub fn name(&self) -> String {
        folder_name(&self.folder)
    }
}

#[derive(Debug)]
pub struct RunSummary {
    /// In the order the folders were given.
    pub folders: Vec<FolderOutcome>,
    pub status: FolderStatus,
}

impl fmt::Display for RunSummary {
    /// `Q1(success), Q2(warning)`
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let line = self
            .folders
            .iter()
            .map(|o| format!("{}({})", o.name(), o.status))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&line)
    }
}

/// Resolved locations inside one assignment folder.
#[derive(Debug, Clone)]
pub struct FolderLayout {
    pub input_file: PathBuf,
    pub reference_file: PathBuf,
    pub submissions_dir: PathBuf,
    pub dirs: ReportDirs,
}

impl FolderLayout {
    pub fn new(folder: &Path, layout: &LayoutConfig) -> Self {
        Self {
            input_file: folder.join(&layout.input_file),
            reference_file: folder.join(&layout.reference_file),
            submissions_dir: folder.join(&layout.submissions_dir),
            dirs: ReportDirs {
                output_dir: folder.join(&layout.output_dir),
                grade_dir: folder.join(&layout.grade_dir),
            },
        }
    }
}

/// The id a submission's reports are named after: its file stem.
pub fn submission_id(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists the `*.c` files of `dir` that are not excluded, sorted by file name.
///
/// Ids that differ only in ASCII case would share report files on a
/// case-insensitive filesystem; of those, only the last by file name is kept.
pub fn discover_submissions(dir: &Path, exclude: &[GlobPattern]) -> fsutil::Result<Vec<PathBuf>> {
    let mut by_id: BTreeMap<String, PathBuf> = BTreeMap::new();
    for file in fsutil::list_files(dir)? {
        if file.extension().map_or(true, |ext| ext != "c") {
            continue;
        }
        if exclude.iter().any(|p| p.matches_file_name(&file)) {
            log::debug!("Excluded: {}", file.to_string_lossy());
            continue;
        }
        let key = submission_id(&file).to_ascii_lowercase();
        if let Some(prev) = by_id.insert(key, file.clone()) {
            log::warn!(
                "Duplicate submission id: {} shadows {}; the latter is skipped",
                file.to_string_lossy(),
                prev.to_string_lossy()
            );
        }
    }
    let mut files: Vec<_> = by_id.into_values().collect();
    files.sort();
    Ok(files)
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.to_string_lossy().into_owned())
}

/// Runs the grading pipeline over assignment folders. Clones share the worker
/// slots, the cancellation token and the progress sink.
#[derive(Clone)]
pub struct Grader {
    cfg: Arc<Config>,
    pool: WorkerPool,
    compiler: Arc<Compiler>,
    executor: Arc<Executor>,
    reference_executor: Arc<Executor>,
}

impl Grader {
    pub fn new(
        cfg: Config,
        cancel: Arc<dyn CancelToken>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let run = &cfg.run;
        let executor = Executor::new()
            .timeout(run.timeout())
            .kill_grace(run.kill_grace())
            .output_limit(run.output_limit_bytes);
        let reference_executor = executor.clone().timeout(run.ground_truth_timeout());
        Self {
            pool: WorkerPool::new(run.effective_jobs(), cancel, progress),
            compiler: Arc::new(Compiler::new(&cfg.compiler)),
            executor: Arc::new(executor),
            reference_executor: Arc::new(reference_executor),
            cfg: Arc::new(cfg),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Grades every folder concurrently. All folders are checked to exist
    /// before any work starts.
    pub async fn run_all(&self, folders: &[PathBuf]) -> Result<RunSummary, MissingFolder> {
        if let Some(missing) = folders.iter().find(|f| !f.is_dir()) {
            return Err(MissingFolder(missing.to_owned()));
        }

        let mut tasks = JoinSet::new();
        for (i, folder) in folders.iter().enumerate() {
            let grader = self.clone();
            let folder = folder.to_owned();
            tasks.spawn(async move { (i, grader.process_folder(&folder).await) });
        }

        let mut outcomes: Vec<Option<FolderOutcome>> = folders.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, res)) => outcomes[i] = Some(res?),
                Err(e) => log::error!("Folder task failed: {}", e),
            }
        }

        let folders: Vec<_> = outcomes
            .into_iter()
            .zip(folders)
            .map(|(outcome, folder)| {
                outcome.unwrap_or_else(|| FolderOutcome {
                    folder: folder.to_owned(),
                    status: FolderStatus::Error,
                    error: None,
                    cancelled_at: None,
                    results: Vec::new(),
                })
            })
            .collect();
        let statuses: Vec<_> = folders.iter().map(|o| o.status).collect();
        let summary = RunSummary {
            status: overall_status(&statuses),
            folders,
        };
        log::info!("Run finished ({}): {}", summary.status, summary);
        Ok(summary)
    }

    pub async fn process_folder(&self, folder: &Path) -> Result<FolderOutcome, MissingFolder> {
        if !folder.is_dir() {
            return Err(MissingFolder(folder.to_owned()));
        }
        let name = folder_name(folder);
        log::info!("[{}] Processing folder", name);

        let mut results = Vec::new();
        let mut outcome = FolderOutcome {
            folder: folder.to_owned(),
            status: FolderStatus::Success,
            error: None,
            cancelled_at: None,
            results: Vec::new(),
        };
        match self.run_stages(folder, &name, &mut results).await {
            Ok(status) => {
                outcome.status = status;
                match status {
                    FolderStatus::Success => log::info!("[{}] Folder graded successfully", name),
                    _ => log::warn!("[{}] Folder graded with compilation errors", name),
                }
            }
            Err(Stop::Cancelled(stage)) => {
                log::warn!("[{}] Cancelled during {}", name, stage);
                outcome.status = FolderStatus::Cancelled;
                outcome.cancelled_at = Some(stage);
            }
            Err(Stop::Failed(e)) => {
                outcome.status = e.status();
                match outcome.status {
                    FolderStatus::Warning => log::warn!("[{}] {}", name, error_chain(&e)),
                    _ => log::error!("[{}] {}", name, error_chain(&e)),
                }
                outcome.error = Some(e);
            }
        }
        results.sort_by(|a, b| a.id.cmp(&b.id));
        outcome.results = results;
        Ok(outcome)
    }

    fn checkpoint(&self, stage: FolderStage) -> Result<(), Stop> {
        if self.pool.is_cancelled() {
            return Err(Stop::Cancelled(stage));
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        folder: &Path,
        name: &str,
        results: &mut Vec<SubmissionResult>,
    ) -> Result<FolderStatus, Stop> {
        let layout = FolderLayout::new(folder, &self.cfg.layout);

        self.checkpoint(FolderStage::Setup)?;
        for dir in [&layout.dirs.output_dir, &layout.dirs.grade_dir] {
            cleanup::reset_dir(dir).map_err(FolderError::Prepare)?;
        }
        let dirs = Arc::new(layout.dirs.clone());

        self.checkpoint(FolderStage::Inputs)?;
        let inputs = input::load_inputs(&layout.input_file);
        if inputs.is_empty() {
            return Err(FolderError::NoInputs(layout.input_file).into());
        }

        self.checkpoint(FolderStage::GroundTruth)?;
        let ground_truth = ground_truth::generate(
            &layout.reference_file,
            &inputs,
            &self.compiler,
            &self.reference_executor,
            &self.pool,
            &format!("[{}] Ground Truth", name),
        )
        .await?;
        self.checkpoint(FolderStage::GroundTruth)?;
        if ground_truth.is_empty() {
            return Err(GroundTruthError::NoEntries.into());
        }
        log::info!(
            "[{}] Ground truth ready for {}/{} inputs",
            name,
            ground_truth.len(),
            inputs.len()
        );
        let ground_truth: Arc<[GroundTruthEntry]> = ground_truth.into();

        self.checkpoint(FolderStage::Compile)?;
        if !layout.submissions_dir.is_dir() {
            return Err(FolderError::NoSubmissionsDir(layout.submissions_dir).into());
        }
        let sources = discover_submissions(&layout.submissions_dir, &self.cfg.layout.exclude)
            .map_err(FolderError::Prepare)?;
        if sources.is_empty() {
            return Err(FolderError::NoSubmissions(layout.submissions_dir).into());
        }
        let artifacts = compiler::compile_all(
            &self.pool,
            &self.compiler,
            sources,
            &format!("[{}] Compiling", name),
        )
        .await;
        let _executables: ArtifactGuard = artifacts.compiled.values().collect();
        if artifacts.cancelled {
            return Err(Stop::Cancelled(FolderStage::Compile));
        }
        for (file, diag) in &artifacts.errors {
            let id = submission_id(Path::new(file));
            results.push(worker::write_compile_error_report(&id, diag, &dirs));
        }
        if artifacts.compiled.is_empty() {
            return Err(FolderError::NothingCompiled.into());
        }

        self.checkpoint(FolderStage::Execute)?;
        let units: Vec<_> = artifacts
            .compiled
            .iter()
            .map(|(file, exe)| (submission_id(Path::new(file)), exe.clone()))
            .collect();
        let out = self
            .pool
            .fan_out(&format!("[{}] Executing", name), units, |(id, exe)| {
                worker::execute_and_grade(
                    id,
                    exe,
                    ground_truth.clone(),
                    self.executor.clone(),
                    dirs.clone(),
                )
            })
            .await;
        // Units that finished after cancellation already wrote their grade file.
        results.extend(out.completed.into_iter().chain(out.abandoned));
        if out.cancelled {
            return Err(Stop::Cancelled(FolderStage::Execute));
        }

        Ok(match artifacts.errors.is_empty() {
            true => FolderStatus::Success,
            false => FolderStatus::Warning,
        })
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
