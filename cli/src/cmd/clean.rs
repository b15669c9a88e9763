use anyhow::{ensure, Context as _};
use cgrade_core::{
    action::{self, CleanTargets},
    interactive::util::confirm,
    print_success,
};

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Clear grade reports.
    #[arg(short, long)]
    pub grades: bool,

    /// Clear output transcripts.
    #[arg(short, long)]
    pub outputs: bool,

    /// Remove leftover build artifacts (object files and the like).
    #[arg(short, long)]
    pub build: bool,

    /// Same as `-gob`; the default when nothing is selected.
    #[arg(short, long)]
    pub all: bool,

    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Args {
    fn targets(&self) -> CleanTargets {
        let targets = CleanTargets {
            grades: self.grades,
            outputs: self.outputs,
            build: self.build,
        };
        if self.all || targets.is_empty() {
            return CleanTargets::all();
        }
        targets
    }
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let targets = args.targets();

    if !args.yes {
        let what: Vec<_> = [
            (targets.grades, "grade reports"),
            (targets.outputs, "output transcripts"),
            (targets.build, "build artifacts"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        let folders: Vec<_> = cfg
            .folders
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        let prompt = format!("Delete {} in {}?", what.join(", "), folders.join(", "));
        if !confirm(&prompt).context("Failed to read confirmation")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let stats = action::do_clean(&cfg, targets);
    ensure!(stats.failed == 0, "Failed to delete {} files", stats.failed);
    print_success!("Deleted {} files.", stats.deleted);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(grades: bool, outputs: bool, build: bool, all: bool) -> Args {
        Args {
            grades,
            outputs,
            build,
            all,
            yes: true,
        }
    }

    #[test]
    fn nothing_selected_means_everything() {
        assert_eq!(args(false, false, false, false).targets(), CleanTargets::all());
        assert_eq!(args(true, false, false, true).targets(), CleanTargets::all());
        assert_eq!(
            args(true, false, false, false).targets(),
            CleanTargets {
                grades: true,
                ..Default::default()
            }
        );
    }
}
