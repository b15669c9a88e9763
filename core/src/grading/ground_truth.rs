use std::path::Path;

use super::{
    cleanup::ArtifactGuard,
    compiler::Compiler,
    executor::Executor,
    input::TestInput,
    outcome::ExecutionOutcome,
    pool::WorkerPool,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthEntry {
    pub input: TestInput,
    pub expected: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GroundTruthError {
    #[error("Reference solution {0} failed to compile: {1}")]
    Compile(String, String),

    #[error("Reference solution produced no usable output")]
    NoEntries,
}

/// Compiles the reference solution and records its output for every input.
///
/// Inputs on which the reference itself times out or fails are left out, so every
/// entry is a usable oracle. Stops early, returning what it has, once cancellation
/// is observed.
pub async fn generate(
    reference: &Path,
    inputs: &[TestInput],
    compiler: &Compiler,
    executor: &Executor,
    pool: &WorkerPool,
    label: &str,
) -> Result<Vec<GroundTruthEntry>, GroundTruthError> {
    let exe = compiler.compile(reference).await.map_err(|diag| {
        GroundTruthError::Compile(reference.to_string_lossy().into_owned(), diag)
    })?;
    let _guard: ArtifactGuard = [exe.clone()].into_iter().collect();

    let total = inputs.len();
    let mut entries = Vec::with_capacity(total);
    for (i, input) in inputs.iter().enumerate() {
        if pool.is_cancelled() {
            log::warn!("{}: cancelled after {}/{} inputs", label, i, total);
            break;
        }
        match executor.run(&exe, input).await {
            ExecutionOutcome::Output(expected) => entries.push(GroundTruthEntry {
                input: input.clone(),
                expected,
            }),
            other => log::warn!(
                "{}: reference gave '{}' for input '{}'; input excluded from grading",
                label,
                other,
                input
            ),
        }
        pool.progress().report(i + 1, total, label);
    }
    Ok(entries)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use crate::grading::{
        compiler::test::script_compiler,
        control::{CancelFlag, NeverCancel, NoProgress},
    };
    use std::{sync::Arc, time::Duration};

    fn inputs(xs: &[&str]) -> Vec<TestInput> {
        xs.iter().map(|&x| TestInput::from(x)).collect()
    }

    fn executor() -> Executor {
        Executor::new()
            .timeout(Duration::from_millis(300))
            .kill_grace(Duration::from_millis(50))
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(2, Arc::new(NeverCancel), Arc::new(NoProgress))
    }

    #[tokio::test]
    async fn builds_entries_and_removes_reference_executable() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("original_sol.c");
        fsutil::write(&reference, "#!/bin/sh\nread x; echo $((x * 2))\n").unwrap();

        let gt = generate(
            &reference,
            &inputs(&["1", "2"]),
            &Compiler::new(&script_compiler()),
            &executor(),
            &pool(),
            "gt",
        )
        .await
        .unwrap();

        assert_eq!(
            gt,
            vec![
                GroundTruthEntry { input: "1".into(), expected: "2".into() },
                GroundTruthEntry { input: "2".into(), expected: "4".into() },
            ]
        );
        assert!(!dir.path().join("original_sol").exists());
    }

    #[tokio::test]
    async fn compile_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("original_sol.c");
        fsutil::write(&reference, "COMPILE_ERROR").unwrap();

        let err = generate(
            &reference,
            &inputs(&["1"]),
            &Compiler::new(&script_compiler()),
            &executor(),
            &pool(),
            "gt",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GroundTruthError::Compile(..)));
    }

    #[tokio::test]
    async fn inputs_the_reference_cannot_handle_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("original_sol.c");
        fsutil::write(
            &reference,
            "#!/bin/sh\nread x\n[ \"$x\" = hang ] && exec sleep 10\n[ \"$x\" = crash ] && exit 1\necho ok-$x\n",
        )
        .unwrap();

        let gt = generate(
            &reference,
            &inputs(&["a", "hang", "crash", "b"]),
            &Compiler::new(&script_compiler()),
            &executor(),
            &pool(),
            "gt",
        )
        .await
        .unwrap();
        let got: Vec<_> = gt.iter().map(|e| e.expected.as_str()).collect();
        assert_eq!(got, ["ok-a", "ok-b"]);
    }

    #[tokio::test]
    async fn cancellation_stops_between_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("original_sol.c");
        fsutil::write(&reference, "#!/bin/sh\nread x; echo $x\n").unwrap();

        let cancel = CancelFlag::new();
        let progress = {
            let cancel = cancel.clone();
            move |done: usize, _: usize, _: &str| {
                if done == 1 {
                    cancel.cancel();
                }
            }
        };
        let pool = WorkerPool::new(1, Arc::new(cancel), Arc::new(progress));
        let gt = generate(
            &reference,
            &inputs(&["1", "2", "3"]),
            &Compiler::new(&script_compiler()),
            &executor(),
            &pool,
            "gt",
        )
        .await
        .unwrap();
        assert_eq!(gt.len(), 1);
    }
}
