//! Limit set: generates alternative restricted transcripts when the
//! area specification caps how many courses may be drawn from a tagged
//! subset.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::clause::Clause;
use crate::course::{CourseInstance, Transcript};
use crate::path::Path;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Limit {
    pub at_most: usize,
    pub clause: Clause,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LimitSet {
    pub limits: Vec<Limit>,
}

impl LimitSet {
    pub fn new(limits: Vec<Limit>) -> Self {
        LimitSet { limits }
    }

    /// Produces the cross product of restricted transcripts: for each
    /// limit, every way of keeping up to `at_most` of the matching
    /// courses, combined across all limits. With no limits declared, the
    /// family is just the original transcript.
    pub fn restricted_transcripts(&self, transcript: &Transcript) -> Vec<Transcript> {
        if self.limits.is_empty() {
            return vec![transcript.clone()];
        }

        let root = Path::root();
        let all: Vec<&CourseInstance> = transcript.iter().collect();

        let mut per_limit_choices: Vec<Vec<Vec<usize>>> = Vec::new();
        for limit in &self.limits {
            let matching_idx: Vec<usize> = all
                .iter()
                .enumerate()
                .filter(|(_, c)| limit.clause.matches(&root, **c).unwrap_or(false))
                .map(|(i, _)| i)
                .collect();

            let keep = limit.at_most.min(matching_idx.len());
            let mut choices: Vec<Vec<usize>> = Vec::new();
            for r in 0..=keep {
                for combo in matching_idx.iter().copied().combinations(r) {
                    choices.push(combo);
                }
            }
            if choices.is_empty() {
                choices.push(Vec::new());
            }
            per_limit_choices.push(choices);
        }

        let non_limited: Vec<usize> = {
            let limited_idx: std::collections::HashSet<usize> = all
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    self.limits
                        .iter()
                        .any(|l| l.clause.matches(&root, **c).unwrap_or(false))
                })
                .map(|(i, _)| i)
                .collect();
            (0..all.len()).filter(|i| !limited_idx.contains(i)).collect()
        };

        let mut out = Vec::new();
        for combo in per_limit_choices.into_iter().multi_cartesian_product() {
            let mut kept: Vec<usize> = non_limited.clone();
            for group in combo {
                kept.extend(group);
            }
            kept.sort_unstable();
            kept.dedup();
            let courses: Vec<CourseInstance> = kept.iter().map(|&i| all[i].clone()).collect();
            out.push(Transcript::new(courses));
        }

        if out.is_empty() {
            out.push(transcript.clone());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{Key, Operator, SingleClause};
    use crate::course::CourseCode;
    use crate::grade::{Grade, GradeOption};
    use crate::value::Value;
    use rust_decimal::Decimal;

    fn course(clbid: &str, subject: &str) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse(&format!("{} 101", subject)).unwrap(),
            shorthand: None,
            credits: Decimal::ONE,
            grade: Some(Grade::A),
            grade_option: GradeOption::Graded,
            is_in_progress: false,
            attempted: true,
            earned: true,
            term: 1,
            gereqs: vec![],
            attributes: vec![],
            source: None,
        }
    }

    #[test]
    fn no_limits_yields_original_transcript() {
        let t = Transcript::new(vec![course("1", "CSCI")]);
        let limits = LimitSet::default();
        let restricted = limits.restricted_transcripts(&t);
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].len(), 1);
    }

    #[test]
    fn at_most_one_of_two_matching_yields_three_variants() {
        let t = Transcript::new(vec![course("1", "ART"), course("2", "ART"), course("3", "CSCI")]);
        let limits = LimitSet::new(vec![Limit {
            at_most: 1,
            clause: Clause::Single(SingleClause {
                key: Key::Subject,
                operator: Operator::EqualTo,
                expected: Value::String("ART".into()),
            }),
        }]);
        let restricted = limits.restricted_transcripts(&t);
        // choose 0 of {1,2}, or either one of them => 3 variants, each plus the unlimited CSCI course
        assert_eq!(restricted.len(), 3);
        for r in &restricted {
            assert!(r.len() <= 2);
            assert!(r.iter().any(|c| c.clbid == "3"));
        }
    }
}
