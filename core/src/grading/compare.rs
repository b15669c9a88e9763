use super::{
    ground_truth::GroundTruthEntry,
    input::TestInput,
    outcome::{ExecutionOutcome, JudgeCode},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub input: TestInput,
    pub expected: String,
    pub actual: ExecutionOutcome,
}

impl Discrepancy {
    pub fn judge(&self) -> JudgeCode {
        self.actual.judge(&self.expected)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub correct: usize,
    pub total: usize,
    /// In input order.
    pub discrepancies: Vec<Discrepancy>,
}

/// Pairs `outcomes` positionally with `ground_truth`.
pub fn compare(ground_truth: &[GroundTruthEntry], outcomes: &[ExecutionOutcome]) -> Comparison {
    debug_assert_eq!(ground_truth.len(), outcomes.len());

    let mut res = Comparison {
        total: ground_truth.len(),
        ..Default::default()
    };
    for (entry, actual) in ground_truth.iter().zip(outcomes) {
        match actual.judge(&entry.expected) {
            JudgeCode::AC => res.correct += 1,
            _ => res.discrepancies.push(Discrepancy {
                input: entry.input.clone(),
                expected: entry.expected.clone(),
                actual: actual.clone(),
            }),
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    fn gt(pairs: &[(&str, &str)]) -> Vec<GroundTruthEntry> {
        pairs
            .iter()
            .map(|&(i, e)| GroundTruthEntry {
                input: i.into(),
                expected: e.into(),
            })
            .collect()
    }

    #[test]
    fn counts_matches_and_keeps_discrepancy_order() {
        let truth = gt(&[("1", "2"), ("2", "4"), ("3", "6"), ("4", "8")]);
        let outcomes = [
            ExecutionOutcome::Output("2".into()),
            ExecutionOutcome::Output("5".into()),
            ExecutionOutcome::Output("6".into()),
            ExecutionOutcome::Output("9".into()),
        ];
        let res = compare(&truth, &outcomes);
        assert_eq!(res.correct, 2);
        assert_eq!(res.total, 4);
        let wrong: Vec<_> = res.discrepancies.iter().map(|d| d.input.as_str()).collect();
        assert_eq!(wrong, ["2", "4"]);
        assert!(res.discrepancies.iter().all(|d| d.judge() == JudgeCode::WA));
    }

    #[test]
    fn timeout_and_runtime_error_never_match() {
        // Even an expected output that spells the outcome's rendering.
        let truth = gt(&[("1", "Timeout"), ("2", "Runtime error: boom")]);
        let outcomes = [
            ExecutionOutcome::Timeout,
            ExecutionOutcome::RuntimeError("boom".into()),
        ];
        let res = compare(&truth, &outcomes);
        assert_eq!(res.correct, 0);
        let judges: Vec<_> = res.discrepancies.iter().map(Discrepancy::judge).collect();
        assert_eq!(judges, [JudgeCode::TLE, JudgeCode::RE]);
    }

    #[test]
    fn empty_ground_truth() {
        assert_eq!(compare(&[], &[]), Comparison::default());
    }
}
