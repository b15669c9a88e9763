use std::io::Write as _;

use cgrade_core::style::ColorTheme as _;
use colored::Colorize as _;

/// `[LEVEL] message`, colored by level. `RUST_LOG` overrides `level`.
pub fn init(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}
