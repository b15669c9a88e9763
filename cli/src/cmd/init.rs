use cgrade_core::{action, print_success};
use std::path::PathBuf;

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = action::init_project(&args.dir)?;
    print_success!(
        "Successfully created {}. Edit `folders` to list the assignment folders.",
        util::replace_homedir_to_tilde(path).to_string_lossy()
    );
    Ok(())
}
