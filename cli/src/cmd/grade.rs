use std::{path::PathBuf, sync::Arc};

use anyhow::ensure;
use cgrade_core::{
    action,
    grading::{CancelFlag, FolderStatus},
};

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Assignment folders to grade. Defaults to `folders` in the config.
    #[arg()] // positional argument
    pub folders: Vec<PathBuf>,

    /// Worker slots (default: number of logical CPUs).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Wall-clock limit per submission run.
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Also list the grade of every submission.
    #[arg(short, long)]
    pub detail: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let mut cfg = global_args.load_config()?;
    if let Some(jobs) = args.jobs {
        cfg.run.jobs = jobs;
    }
    if let Some(ms) = args.timeout_ms {
        cfg.run.timeout_ms = ms;
    }

    let cwd = util::current_dir();
    let folders = args.folders.iter().map(|f| cwd.join(f)).collect();

    let cancel = CancelFlag::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted: waiting for running tasks to finish...");
                cancel.cancel();
            }
        })
    };

    let summary = action::do_grade(
        cfg,
        folders,
        Arc::new(cancel),
        args.detail,
        !global_args.quiet,
    )
    .await;
    ctrl_c.abort();

    let summary = summary?;
    ensure!(
        summary.status != FolderStatus::Error,
        "No folder was graded successfully"
    );
    Ok(())
}
