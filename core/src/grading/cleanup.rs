use std::path::{Path, PathBuf};

use crate::serdable::GlobPattern;

/// Deletes the tracked files when dropped. Failures are logged, never raised.
#[derive(Debug)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
}

impl<P: Into<PathBuf>> FromIterator<P> for ArtifactGuard {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            self::remove_artifact(&path);
        }
    }
}

pub fn remove_artifact(path: &Path) {
    match fsutil::remove_file_if_exists(path) {
        Ok(true) => log::debug!("Deleted: {}", path.to_string_lossy()),
        Ok(false) => (),
        Err(e) => log::error!("Error deleting artifact: {:#}", e),
    }
}

/// Deletes and recreates `dir`, leaving it empty.
pub fn reset_dir(dir: &Path) -> fsutil::Result<()> {
    fsutil::remove_dir_all_if_exists(dir)?;
    fsutil::mkdir_all(dir)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted: usize,
    pub kept: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for SweepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.deleted += rhs.deleted;
        self.kept += rhs.kept;
        self.failed += rhs.failed;
    }
}

/// Removes the files directly inside `dir`, except those matching `keep`.
/// A missing directory is only worth a warning.
pub fn clear_dir_contents(dir: &Path, keep: &[GlobPattern]) -> SweepStats {
    let mut stats = SweepStats::default();
    let files = match fsutil::list_files(dir) {
        Ok(files) => files,
        Err(e) => {
            log::warn!("Directory not cleared: {:#}", e);
            return stats;
        }
    };
    for file in files {
        if keep.iter().any(|p| p.matches_file_name(&file)) {
            log::debug!("Skipping example file: {}", file.to_string_lossy());
            stats.kept += 1;
            continue;
        }
        match fsutil::remove_file(&file) {
            Ok(()) => {
                log::debug!("Deleted file: {}", file.to_string_lossy());
                stats.deleted += 1;
            }
            Err(e) => {
                log::error!("{:#}", e);
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Recursively removes leftover compiler outputs (object files and the like)
/// under each of `roots`.
pub fn sweep_build_artifacts(roots: &[PathBuf], patterns: &[GlobPattern]) -> SweepStats {
    let mut stats = SweepStats::default();
    if patterns.is_empty() {
        return stats;
    }
    let patterns: Vec<_> = patterns.iter().map(|p| (**p).clone()).collect();
    for root in roots {
        let files = match fsutil::find_files_recursive(root, &patterns) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Build artifacts not swept: {:#}", e);
                continue;
            }
        };
        for file in files {
            match fsutil::remove_file_if_exists(&file) {
                Ok(_) => stats.deleted += 1,
                Err(e) => {
                    log::error!("{:#}", e);
                    stats.failed += 1;
                }
            }
        }
    }
    log::info!(
        "Build artifacts swept. Deleted: {}, Errors: {}",
        stats.deleted,
        stats.failed
    );
    stats
}
