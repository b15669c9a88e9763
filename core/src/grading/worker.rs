use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    compare::compare,
    executor::Executor,
    ground_truth::GroundTruthEntry,
    outcome::ExecutionOutcome,
    report::GradeReport,
};

/// Where a folder's per-submission files go.
#[derive(Debug, Clone)]
pub struct ReportDirs {
    pub output_dir: PathBuf,
    pub grade_dir: PathBuf,
}

impl ReportDirs {
    pub fn transcript_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.txt", id))
    }

    pub fn grade_path(&self, id: &str) -> PathBuf {
        self.grade_dir.join(format!("{}.txt", id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub id: String,
    pub report: GradeReport,
}

/// Runs one compiled submission over the whole ground truth and writes its
/// transcript and grade report. Never fails; write errors are logged.
pub async fn execute_and_grade(
    id: String,
    exe: PathBuf,
    ground_truth: Arc<[GroundTruthEntry]>,
    executor: Arc<Executor>,
    dirs: Arc<ReportDirs>,
) -> SubmissionResult {
    let report = if ground_truth.is_empty() {
        GradeReport::NoInputs
    } else {
        let mut outcomes = Vec::with_capacity(ground_truth.len());
        for entry in ground_truth.iter() {
            outcomes.push(executor.run(&exe, &entry.input).await);
        }
        write_transcript(&dirs.transcript_path(&id), &ground_truth, &outcomes);
        GradeReport::Graded(compare(&ground_truth, &outcomes))
    };

    write_report(&dirs.grade_path(&id), &report);
    log::debug!("{}: {}%", id, report.percentage());
    SubmissionResult { id, report }
}

/// Grades a submission that never compiled.
pub fn write_compile_error_report(id: &str, diagnostic: &str, dirs: &ReportDirs) -> SubmissionResult {
    let report = GradeReport::CompileError(diagnostic.to_owned());
    write_report(&dirs.grade_path(id), &report);
    SubmissionResult {
        id: id.to_owned(),
        report,
    }
}

fn write_report(path: &Path, report: &GradeReport) {
    match report.write(path) {
        Ok(()) => log::debug!("Grade file created: {}", path.to_string_lossy()),
        Err(e) => log::error!("Error writing grade file: {:#}", e),
    }
}

fn write_transcript(path: &Path, ground_truth: &[GroundTruthEntry], outcomes: &[ExecutionOutcome]) {
    let mut s = String::new();
    for (entry, outcome) in ground_truth.iter().zip(outcomes) {
        let _ = write!(s, "Input: {}\nOutput: {}\n\n", entry.input, outcome);
    }
    if let Err(e) = fsutil::write(path, s) {
        log::error!("Error writing output file: {:#}", e);
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use std::{os::unix::fs::PermissionsExt, time::Duration};

    fn setup() -> (tempfile::TempDir, Arc<ReportDirs>) {
        let dir = tempfile::tempdir().unwrap();
        let dirs = ReportDirs {
            output_dir: dir.path().join("output"),
            grade_dir: dir.path().join("grade"),
        };
        fsutil::mkdir_all(&dirs.output_dir).unwrap();
        fsutil::mkdir_all(&dirs.grade_dir).unwrap();
        (dir, Arc::new(dirs))
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("alice");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn truth(pairs: &[(&str, &str)]) -> Arc<[GroundTruthEntry]> {
        pairs
            .iter()
            .map(|&(i, e)| GroundTruthEntry {
                input: i.into(),
                expected: e.into(),
            })
            .collect()
    }

    fn executor() -> Arc<Executor> {
        Arc::new(
            Executor::new()
                .timeout(Duration::from_millis(300))
                .kill_grace(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn writes_transcript_and_grade() {
        let (dir, dirs) = setup();
        let exe = script(dir.path(), "read x; [ \"$x\" = 1 ] && echo 2 || echo 5");
        let res = execute_and_grade(
            "alice".into(),
            exe,
            truth(&[("1", "2"), ("2", "4")]),
            executor(),
            dirs.clone(),
        )
        .await;

        assert_eq!(res.report.percentage(), 50);
        assert_eq!(
            fsutil::read_to_string(dirs.transcript_path("alice")).unwrap(),
            "Input: 1\nOutput: 2\n\nInput: 2\nOutput: 5\n\n"
        );
        assert_eq!(
            fsutil::read_to_string(dirs.grade_path("alice")).unwrap(),
            res.report.render()
        );
    }

    #[tokio::test]
    async fn empty_ground_truth_is_no_inputs() {
        let (dir, dirs) = setup();
        let exe = script(dir.path(), "echo never");
        let res = execute_and_grade("alice".into(), exe, truth(&[]), executor(), dirs.clone()).await;
        assert_eq!(res.report, GradeReport::NoInputs);
        assert_eq!(
            fsutil::read_to_string(dirs.grade_path("alice")).unwrap(),
            "Grade: 0%\nNo inputs provided.\n"
        );
    }

    #[tokio::test]
    async fn unwritable_grade_dir_is_logged_not_fatal() {
        let (dir, dirs) = setup();
        let exe = script(dir.path(), "echo 2");
        fsutil::remove_dir_all_if_exists(&dirs.grade_dir).unwrap();
        fsutil::write(&dirs.grade_dir, "not a directory").unwrap();
        let res = execute_and_grade("alice".into(), exe, truth(&[("1", "2")]), executor(), dirs.clone()).await;
        assert_eq!(res.report.percentage(), 100);
        assert!(!dirs.grade_path("alice").exists());
    }

    #[test]
    fn compile_error_report() {
        let (_dir, dirs) = setup();
        let res = write_compile_error_report("bob", "bob.c:3: error", &dirs);
        assert_eq!(res.report.percentage(), 0);
        assert_eq!(
            fsutil::read_to_string(dirs.grade_path("bob")).unwrap(),
            "Grade: 0%\nCompilation error: bob.c:3: error\n"
        );
    }
}
