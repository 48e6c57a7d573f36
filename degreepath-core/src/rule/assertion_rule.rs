//! The standalone Assertion rule, grounded in `original_source`'s
//! `degreepath/rule.py` dispatch table, which accepts a bare
//! `{assert: …}` rule body in addition to folding assertions into
//! Count's `audit` clause. Evaluated over the whole (deduplicated)
//! transcript, the same default source a `From` rule would use with no
//! `from:` given.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::context::RequirementContext;
use crate::course::{Clbid, RepeatMode};
use crate::path::Path;

use super::{ResultDetail, ResultNode, Solution, SolutionIter};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssertionRule {
    pub assertion: Assertion,
    pub path: Path,
}

impl AssertionRule {
    pub fn has_potential(&self, _ctx: &RequirementContext) -> bool {
        true
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        ctx.transcript.iter().map(|c| c.clbid.clone()).collect()
    }

    pub fn solutions<'ctx>(&self, _ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        SolutionIter::one(Solution::Assertion(AssertionSolution { rule: self.clone() }))
    }
}

#[derive(Clone, Debug)]
pub struct AssertionSolution {
    pub rule: AssertionRule,
}

pub type AssertionResult = ResultNode;

impl AssertionSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        let items = ctx.transcript.deduplicated(RepeatMode::All);
        let bound = match self.rule.assertion.compare_and_resolve_with(&items, vec![]) {
            Ok(bound) => bound,
            Err(_) => {
                return ResultNode {
                    path: self.rule.path.clone(),
                    ok: false,
                    rank: 0.0,
                    max_rank: 1.0,
                    detail: ResultDetail::Assertion(crate::assertion::BoundAssertion::overridden(
                        self.rule.path.clone(),
                        None,
                    )),
                }
            }
        };

        ResultNode {
            path: self.rule.path.clone(),
            ok: bound.ok,
            rank: bound.rank,
            max_rank: 1.0,
            detail: ResultDetail::Assertion(bound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::Aggregation;
    use crate::claim::MulticountableTable;
    use crate::clause::{Key, Operator, SingleClause};
    use crate::context::RequirementContext;
    use crate::course::{CourseCode, CourseInstance, Transcript};
    use crate::exception::ExceptionSet;
    use crate::grade::{Grade, GradeOption};
    use crate::value::Value;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn course(clbid: &str, code: &str) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse(code).unwrap(),
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

    fn ctx(courses: Vec<CourseInstance>) -> RequirementContext {
        RequirementContext::new(Transcript::new(courses), vec![], ExceptionSet::default(), HashMap::new(), MulticountableTable::default())
    }

    fn rule(expected: i64) -> AssertionRule {
        AssertionRule {
            assertion: Assertion {
                aggregation: Aggregation::Count,
                where_clause: None,
                clause: SingleClause {
                    key: Key::Count,
                    operator: Operator::GreaterThanOrEqualTo,
                    expected: Value::Integer(expected),
                },
                path: Path::new(["$", ".assert"]),
                message: None,
            },
            path: Path::new(["$", ".assert"]),
        }
    }

    #[test]
    fn solutions_yields_exactly_one_candidate() {
        let context = ctx(vec![course("1", "CSCI 111")]);
        let r = rule(1);
        let solutions: Vec<_> = r.solutions(&context).collect();
        assert_eq!(solutions.len(), 1);
    }

    #[test]
    fn audits_over_the_whole_deduplicated_transcript() {
        let context = ctx(vec![course("1", "CSCI 111"), course("2", "CSCI 112")]);
        let solution = AssertionSolution { rule: rule(2) };
        let result = solution.audit(&context);
        assert!(result.ok());
    }

    #[test]
    fn fails_when_the_transcript_falls_short() {
        let context = ctx(vec![course("1", "CSCI 111")]);
        let solution = AssertionSolution { rule: rule(2) };
        let result = solution.audit(&context);
        assert!(!result.ok());
    }
}
