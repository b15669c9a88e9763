use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    sync::Arc,
};

use tokio::process::Command;

use super::{cleanup, pool::WorkerPool};
use crate::{command::CommandTemplate, config::CompilerConfig};

/// Either the produced executable or the compiler's diagnostic.
pub type CompileOutcome = Result<PathBuf, String>;

#[derive(Debug, Clone)]
pub struct Compiler {
    command: CommandTemplate,
    env: BTreeMap<String, String>,
    exe_extension: String,
}

impl Compiler {
    pub fn new(cfg: &CompilerConfig) -> Self {
        Self {
            command: cfg.command.clone(),
            env: cfg.env.clone(),
            exe_extension: cfg.exe_extension.clone(),
        }
    }

    /// `Q1/C/alice.c` becomes `Q1/C/alice` (or `alice.exe` where executables carry one).
    pub fn executable_path(&self, src: &Path) -> PathBuf {
        src.with_extension(&self.exe_extension)
    }

    pub async fn compile(&self, src: &Path) -> CompileOutcome {
        let exe = self.executable_path(src);
        let argv = self.command.render(src, &exe);
        let Some((program, args)) = argv.split_first() else {
            return Err("Empty compiler command".to_owned());
        };

        let output = Command::new(program)
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let src_name = src.to_string_lossy();
        match output {
            Err(e) => {
                log::error!(
                    "Failed to spawn compiler '{}' for {}: {}",
                    program.to_string_lossy(),
                    src_name,
                    e
                );
                Err(format!(
                    "Failed to spawn compiler '{}': {}",
                    program.to_string_lossy(),
                    e
                ))
            }
            Ok(out) if !out.status.success() => {
                log::debug!("Compilation failed: {}", src_name);
                Err(diagnostic(&out))
            }
            Ok(_) if !exe.is_file() => {
                log::debug!("Compiler produced no executable for {}", src_name);
                Err(format!(
                    "Compiler exited successfully but produced no executable at {}",
                    exe.to_string_lossy()
                ))
            }
            Ok(_) => {
                log::debug!("Compilation successful: {}", src_name);
                Ok(exe)
            }
        }
    }
}

fn diagnostic(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_owned();
    }
    // Some compilers report errors on stdout.
    let stdout = String::from_utf8_lossy(&out.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_owned();
    }
    format!("Compiler failed with {}", out.status)
}

/// Result of compiling every submission of one folder, keyed by source file name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompiledArtifacts {
    pub compiled: BTreeMap<String, PathBuf>,
    pub errors: BTreeMap<String, String>,
    pub cancelled: bool,
}

impl CompiledArtifacts {
    pub fn len(&self) -> usize {
        self.compiled.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiles `sources` in parallel on the pool.
///
/// Units that finish after cancellation was observed are discarded and their
/// executables deleted.
pub async fn compile_all(
    pool: &WorkerPool,
    compiler: &Compiler,
    sources: Vec<PathBuf>,
    label: &str,
) -> CompiledArtifacts {
    let total = sources.len();
    let compiler = Arc::new(compiler.clone());

    let out = pool
        .fan_out(label, sources, |src| {
            let compiler = compiler.clone();
            async move {
                let res = compiler.compile(&src).await;
                (file_name_of(&src), res)
            }
        })
        .await;

    for (file, res) in out.abandoned {
        if let Ok(exe) = res {
            log::debug!("Discarding {} compiled after cancellation", file);
            cleanup::remove_artifact(&exe);
        }
    }

    let mut artifacts = CompiledArtifacts {
        cancelled: out.cancelled,
        ..Default::default()
    };
    for (file, res) in out.completed {
        match res {
            Ok(exe) => {
                artifacts.compiled.insert(file, exe);
            }
            Err(diag) => {
                artifacts.errors.insert(file, diag);
            }
        }
    }

    if !artifacts.cancelled {
        let ok = artifacts.compiled.len();
        if ok == 0 && total > 0 {
            log::error!("{}: no files compiled successfully!", label);
        } else if ok != total {
            log::warn!("{}: compiled {}/{} files successfully.", label, ok, total);
        } else {
            log::info!("{}: all {} files compiled successfully.", label, total);
        }
    }
    artifacts
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
