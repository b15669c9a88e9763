pub mod clean;
pub mod grade;
pub mod init;

use std::path::PathBuf;

use anyhow::Context as _;
use cgrade_core::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file. By default `cgrade.toml` is searched for in the current
    /// directory and its ancestors.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("g"))]
    Grade(grade::Args),
    Clean(clean::Args),
    Init(init::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Grade(args) => grade::exec(args, self).await,
            Clean(args) => clean::exec(args, self),
            Init(args) => init::exec(args, self),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        use log::LevelFilter::*;
        if self.quiet {
            return Error;
        }
        match self.verbose {
            0 => Info,
            1 => Debug,
            _ => Trace,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(path.clone())
                .with_context(|| format!("Failed to load config {:?}", path)),
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn verbosity_flags() {
        let args = GlobalArgs::parse_from(["cgrade", "grade", "-vv"]);
        assert_eq!(args.log_level(), log::LevelFilter::Trace);
        let args = GlobalArgs::parse_from(["cgrade", "-q", "clean", "-y"]);
        assert_eq!(args.log_level(), log::LevelFilter::Error);
        assert!(GlobalArgs::try_parse_from(["cgrade", "grade", "-v", "-q"]).is_err());
    }

    #[test]
    fn grade_args() {
        let args = GlobalArgs::parse_from(["cgrade", "grade", "Q1", "Q2", "-j", "4", "--timeout-ms", "500"]);
        let Subcommand::Grade(g) = args.subcmd else {
            panic!("expected grade");
        };
        assert_eq!(g.folders, vec![PathBuf::from("Q1"), PathBuf::from("Q2")]);
        assert_eq!(g.jobs, Some(4));
        assert_eq!(g.timeout_ms, Some(500));
    }
}
