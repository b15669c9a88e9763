use std::{
    fs::{self, ReadDir},
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}'): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),

        #[error("Invalid glob pattern '{0}': {1}")]
        Pattern(String, #[source] ::glob::PatternError),
    }

    impl Error {
        pub fn path(&self) -> Option<&std::path::Path> {
            match self {
                Error::SingleIO(_, path, _) | Error::FromToIO(_, path, _, _) => Some(path),
                Error::Pattern(..) => None,
            }
        }

        pub fn is_not_found(&self) -> bool {
            match self {
                Error::SingleIO(_, _, e) | Error::FromToIO(_, _, _, e) => {
                    e.kind() == io::ErrorKind::NotFound
                }
                Error::Pattern(..) => false,
            }
        }
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

/// Writes `contents` to a temporary sibling of `filepath` and renames it into place,
/// so readers never observe a half-written file under the final name.
#[must_use]
pub fn write_atomic<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let filepath = filepath.as_ref();
    let tmp = self::tmp_sibling(filepath);
    self::write_with_mkdir(&tmp, contents)?;
    self::rename(&tmp, filepath).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })
}

fn tmp_sibling(filepath: &Path) -> PathBuf {
    let mut name = filepath
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    filepath.with_file_name(name)
}

#[must_use]
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    fs::rename(&from, &to).map_err(|e| {
        Error::FromToIO(
            "Cannot rename file",
            from.as_ref().to_owned(),
            to.as_ref().to_owned(),
            e,
        )
    })
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn remove_file(filepath: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(&filepath)
        .map_err(|e| Error::SingleIO("Cannot remove file", filepath.as_ref().to_owned(), e))
}

/// Removes a file; a file that is already gone is not an error.
#[must_use]
pub fn remove_file_if_exists(filepath: impl AsRef<Path>) -> Result<bool> {
    match self::remove_file(filepath) {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[must_use]
pub fn remove_dir_all_if_exists(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::SingleIO("Cannot remove dir", dir.to_owned(), e)),
    }
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// Lists regular files directly under `dir`, sorted by file name.
pub fn list_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in self::read_dir(&dir)?.filter_map(std::result::Result::ok) {
        let Ok(ft) = entry.file_type() else {
            continue;
        };
        if ft.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Recursively collects files under `dir` whose file name matches one of `patterns`.
pub fn find_files_recursive(dir: impl AsRef<Path>, patterns: &[::glob::Pattern]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![dir.as_ref().to_owned()];
    while let Some(dir) = stack.pop() {
        for entry in self::read_dir(&dir)?.filter_map(std::result::Result::ok) {
            let Ok(ft) = entry.file_type() else {
                continue;
            };
            if ft.is_dir() {
                stack.push(entry.path());
                continue;
            }
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();
            if patterns.iter().any(|p| p.matches(&filename)) {
                found.push(entry.path());
            }
        }
    }
    found.sort();
    Ok(found)
}

pub fn parse_pattern(pattern: &str) -> Result<::glob::Pattern> {
    ::glob::Pattern::new(pattern).map_err(|e| Error::Pattern(pattern.to_owned(), e))
}
