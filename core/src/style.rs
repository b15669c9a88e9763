use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::grading::{FolderOutcome, FolderStatus, GradeReport, JudgeCode, RunSummary};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false;
    };
    match v.as_str() {
        "truecolor" | "24bit" => true,
        _ => false,
    }
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for JudgeCode {
    fn color(&self) -> Color {
        use JudgeCode::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Yellow,
                TLE => Color::Red,
                RE => Color::Magenta,
            };
        }

        match self {
            AC => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            WA => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            TLE => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            RE => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
        }
    }
}

impl ColorTheme for FolderStatus {
    fn color(&self) -> Color {
        use FolderStatus::*;
        match self {
            Success => JudgeCode::AC.color(),
            Warning => JudgeCode::WA.color(),
            Error => JudgeCode::TLE.color(),
            Cancelled => Color::BrightBlack,
        }
    }
}

fn badge(text: impl std::fmt::Display, bg: Color) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", text).on_color(bg).bold().color(fg)
}

pub fn status_badge(status: FolderStatus) -> ColoredString {
    badge(status, status.color())
}

fn grade_color(report: &GradeReport) -> Color {
    match report {
        GradeReport::CompileError(_) => JudgeCode::RE.color(),
        _ if report.percentage() == 100 => JudgeCode::AC.color(),
        _ if report.timeout_count() > 0 => JudgeCode::TLE.color(),
        _ => JudgeCode::WA.color(),
    }
}

pub fn print_folder_detail(outcome: &FolderOutcome) {
    let width = outcome
        .results
        .iter()
        .map(|r| r.id.len())
        .max()
        .unwrap_or(0);
    for r in &outcome.results {
        let note = match &r.report {
            GradeReport::CompileError(_) => " (compilation error)".dimmed().to_string(),
            GradeReport::NoInputs => " (no inputs)".dimmed().to_string(),
            report if report.timeout_count() > 0 => {
                format!(" ({} timeouts)", report.timeout_count()).dimmed().to_string()
            }
            _ => String::new(),
        };
        println!(
            "  {:width$} {}{}",
            r.id,
            format!("{:>3}%", r.report.percentage())
                .color(grade_color(&r.report))
                .bold(),
            note,
            width = width,
        );
    }
}

/// Prints one block per folder, then the overall status line.
pub fn print_run_summary(summary: &RunSummary, detailed: bool) {
    let (cols, _) = terminal::size().unwrap_or((40, 40));
    const BOLD_LINE: &str = "━";
    let bold_bar = BOLD_LINE.repeat(cols as usize).blue().bold();

    println!("\n{}", bold_bar);
    for outcome in &summary.folders {
        let graded = outcome.results.len();
        let mean = match graded {
            0 => 0.0,
            n => outcome
                .results
                .iter()
                .map(|r| r.report.percentage() as f64)
                .sum::<f64>()
                / n as f64,
        };
        print!(
            "{} {}",
            status_badge(outcome.status),
            outcome.name().bright_yellow().bold()
        );
        if graded > 0 {
            print!(
                " {}",
                format!("{} graded, mean {:.1}%", graded, mean).cyan()
            );
        }
        if let Some(e) = &outcome.error {
            print!(" {}", e.to_string().bright_red());
        }
        if let Some(stage) = outcome.cancelled_at {
            print!(" {}", format!("(stopped during {})", stage).dimmed());
        }
        println!();
        if detailed {
            print_folder_detail(outcome);
        }
    }
    println!("{}", bold_bar);

    let bar = "-".repeat(5);
    println!(
        "{} {} {} {}",
        bar,
        status_badge(summary.status),
        summary.to_string().bold(),
        bar
    );
}
