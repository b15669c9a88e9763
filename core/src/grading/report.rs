use std::{fmt::Write as _, path::Path};

use super::{
    compare::{Comparison, Discrepancy},
    input::TestInput,
    outcome::JudgeCode,
};

/// The content of one `grade/<id>.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeReport {
    CompileError(String),
    NoInputs,
    Graded(Comparison),
}

impl GradeReport {
    /// `ceil(100 * correct / total)`, in integer arithmetic so that exact
    /// percentages are never rounded up by float error.
    pub fn percentage(&self) -> usize {
        match self {
            Self::Graded(Comparison { correct, total, .. }) if *total > 0 => {
                (100 * correct + total - 1) / total
            }
            _ => 0,
        }
    }

    pub fn exact_percentage(&self) -> f64 {
        match self {
            Self::Graded(Comparison { correct, total, .. }) if *total > 0 => {
                *correct as f64 * 100.0 / *total as f64
            }
            _ => 0.0,
        }
    }

    fn discrepancies(&self) -> &[Discrepancy] {
        match self {
            Self::Graded(c) => &c.discrepancies,
            _ => &[],
        }
    }

    pub fn timeout_inputs(&self) -> Vec<&TestInput> {
        self.discrepancies()
            .iter()
            .filter(|d| d.judge() == JudgeCode::TLE)
            .map(|d| &d.input)
            .collect()
    }

    pub fn timeout_count(&self) -> usize {
        self.timeout_inputs().len()
    }

    /// Every input that did not get the expected output, timeouts included.
    pub fn wrong_inputs(&self) -> Vec<&TestInput> {
        self.discrepancies().iter().map(|d| &d.input).collect()
    }

    pub fn render(&self) -> String {
        let comparison = match self {
            Self::CompileError(diag) => {
                return format!("Grade: 0%\nCompilation error: {}\n", diag)
            }
            Self::NoInputs => return "Grade: 0%\nNo inputs provided.\n".to_owned(),
            Self::Graded(c) => c,
        };

        let mut s = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(s, "Grade: {}%", self.percentage());
        let _ = writeln!(s, "(Calculated grade is: {:.2}%)", self.exact_percentage());

        let wrong = self.wrong_inputs();
        if !wrong.is_empty() {
            let _ = writeln!(s, "Wrong Inputs: {}", join(&wrong));
        }
        let timeouts = self.timeout_inputs();
        if !timeouts.is_empty() {
            let _ = writeln!(s, "Timeouts: {}/{}", timeouts.len(), comparison.total);
            let _ = writeln!(s, "Timeout Inputs: {}", join(&timeouts));
        }
        if !comparison.discrepancies.is_empty() {
            s.push_str("\nDiscrepancies:\n");
            for d in &comparison.discrepancies {
                let _ = write!(
                    s,
                    "Input: {}\nExpected: {}\nActual: {}\n\n",
                    d.input, d.expected, d.actual
                );
            }
        }
        s
    }

    /// Replaces `path` atomically, so a reader never sees a half-written report.
    pub fn write(&self, path: &Path) -> fsutil::Result<()> {
        fsutil::write_atomic(path, self.render())
    }
}

fn join(inputs: &[&TestInput]) -> String {
    inputs
        .iter()
        .map(|i| i.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grading::{compare::compare, ground_truth::GroundTruthEntry, outcome::ExecutionOutcome};

    fn graded(pairs: &[(&str, &str)], outcomes: Vec<ExecutionOutcome>) -> GradeReport {
        let gt: Vec<_> = pairs
            .iter()
            .map(|&(i, e)| GroundTruthEntry {
                input: i.into(),
                expected: e.into(),
            })
            .collect();
        GradeReport::Graded(compare(&gt, &outcomes))
    }

    fn out(s: &str) -> ExecutionOutcome {
        ExecutionOutcome::Output(s.into())
    }

    #[test]
    fn percentage_is_ceiled() {
        let cases = [(0, 3, 0), (1, 3, 34), (2, 3, 67), (1, 2, 50), (3, 3, 100), (1, 7, 15)];
        for (correct, total, want) in cases {
            let report = GradeReport::Graded(Comparison {
                correct,
                total,
                discrepancies: vec![],
            });
            assert_eq!(report.percentage(), want, "{}/{}", correct, total);
        }
        assert_eq!(GradeReport::NoInputs.percentage(), 0);
        assert_eq!(GradeReport::CompileError("x".into()).percentage(), 0);
        assert_eq!(
            GradeReport::Graded(Comparison::default()).percentage(),
            0
        );
    }

    #[test]
    fn render_half_correct() {
        let report = graded(&[("1", "2"), ("2", "4")], vec![out("2"), out("5")]);
        assert_eq!(
            report.render(),
            "Grade: 50%\n\
             (Calculated grade is: 50.00%)\n\
             Wrong Inputs: 2\n\
             \n\
             Discrepancies:\n\
             Input: 2\n\
             Expected: 4\n\
             Actual: 5\n\
             \n"
        );
    }

    #[test]
    fn render_timeouts() {
        let report = graded(
            &[("1", "1"), ("2", "4"), ("3", "9")],
            vec![out("1"), out("4"), ExecutionOutcome::Timeout],
        );
        assert_eq!(report.timeout_count(), 1);
        assert_eq!(
            report.render(),
            "Grade: 67%\n\
             (Calculated grade is: 66.67%)\n\
             Wrong Inputs: 3\n\
             Timeouts: 1/3\n\
             Timeout Inputs: 3\n\
             \n\
             Discrepancies:\n\
             Input: 3\n\
             Expected: 9\n\
             Actual: Timeout\n\
             \n"
        );
    }

    #[test]
    fn render_all_correct_has_no_optional_sections() {
        let report = graded(&[("1", "2")], vec![out("2")]);
        assert_eq!(
            report.render(),
            "Grade: 100%\n(Calculated grade is: 100.00%)\n"
        );
    }

    #[test]
    fn render_compile_error_and_no_inputs() {
        assert_eq!(
            GradeReport::CompileError("a.c:1: error: expected ';'".into()).render(),
            "Grade: 0%\nCompilation error: a.c:1: error: expected ';'\n"
        );
        assert_eq!(
            GradeReport::NoInputs.render(),
            "Grade: 0%\nNo inputs provided.\n"
        );
    }

    #[test]
    fn write_replaces_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.txt");
        fsutil::write(&path, "Grade: 10%\nstale").unwrap();

        let report = graded(&[("1", "2")], vec![out("2")]);
        report.write(&path).unwrap();
        report.write(&path).unwrap();
        assert_eq!(fsutil::read_to_string(&path).unwrap(), report.render());
        assert_eq!(fsutil::list_files(dir.path()).unwrap(), vec![path]);
    }
}
