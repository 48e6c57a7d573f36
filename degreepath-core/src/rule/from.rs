//! The From rule: resolves a source of items, filters with `where`, and
//! enumerates minimal satisfying subsets in increasing size order,
//! grounded in `original_source`'s `rule/given/source.py` and validated
//! against `tests/test_from.py`'s exact subset counts.

use std::collections::HashSet;

use itertools::{Combinations, Itertools};
use serde::{Deserialize, Serialize};

use crate::area_pointer::AreaPointer;
use crate::assertion::{Assertion, BoundAssertion};
use crate::claim::ClaimOutcome;
use crate::clause::Clause;
use crate::context::RequirementContext;
use crate::course::{Clbid, CourseInstance, RepeatMode};
use crate::exception::ExceptionKind;
use crate::limit::LimitSet;
use crate::path::Path;
use crate::value::Value;

use super::{ResultDetail, ResultNode, Solution, SolutionIter};

fn default_true() -> bool {
    true
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromSource {
    #[serde(rename = "student.courses")]
    StudentCourses,
    #[serde(rename = "student.areas")]
    StudentAreas,
    Requirements(Vec<String>),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FromRule {
    pub source: FromSource,
    #[serde(default)]
    pub where_clause: Option<Clause>,
    #[serde(default)]
    pub repeats: RepeatMode,
    pub assertion: Assertion,
    #[serde(default)]
    pub allow_claimed: bool,
    #[serde(default = "default_true")]
    pub claim: bool,
    #[serde(default)]
    pub limit: LimitSet,
    pub path: Path,
}

impl FromRule {
    fn resolved_courses<'a>(&self, ctx: &'a RequirementContext) -> Vec<&'a CourseInstance> {
        match &self.source {
            FromSource::StudentCourses => ctx.transcript.deduplicated(self.repeats),
            FromSource::Requirements(names) => ctx.matched_by_requirements(names),
            FromSource::StudentAreas => Vec::new(),
        }
    }

    fn filtered_courses<'a>(&self, ctx: &'a RequirementContext) -> Vec<&'a CourseInstance> {
        let items = self.resolved_courses(ctx);
        match &self.where_clause {
            None => items,
            Some(clause) => items
                .into_iter()
                .filter(|c| clause.matches(&self.path, *c).unwrap_or(false))
                .collect(),
        }
    }

    fn filtered_areas<'a>(&self, ctx: &'a RequirementContext) -> Vec<&'a AreaPointer> {
        match &self.where_clause {
            None => ctx.pointers.iter().collect(),
            Some(clause) => ctx
                .pointers
                .iter()
                .filter(|p| clause.matches(&self.path, *p).unwrap_or(false))
                .collect(),
        }
    }

    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        match self.source {
            FromSource::StudentAreas => !self.filtered_areas(ctx).is_empty(),
            _ => true,
        }
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        self.filtered_courses(ctx).iter().map(|c| c.clbid.clone()).collect()
    }

    pub fn solutions<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        if matches!(self.source, FromSource::StudentAreas) {
            return self.solutions_over_areas(ctx);
        }

        let filtered = self.filtered_courses(ctx);
        SolutionIter::From(Box::new(FromSolutionIter::new(self.clone(), filtered)))
    }

    fn solutions_over_areas<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        let filtered = self.filtered_areas(ctx);
        let actual = Value::Integer(filtered.len() as i64);
        let ok = self.assertion.clause.evaluate(&self.path, &actual).unwrap_or(false);
        let rank = self.assertion.clause.rank(&actual, ok);
        let bound = BoundAssertion {
            actual,
            expected: self.assertion.clause.expected.clone(),
            ok,
            rank,
            inserted: Vec::new(),
            path: self.path.clone(),
            message: self.assertion.message.clone(),
            overridden: false,
        };
        SolutionIter::one(Solution::From(FromSolution {
            rule: self.clone(),
            matched: Vec::new(),
            bound,
            area_sourced: true,
        }))
    }
}

/// Resumable state for minimal-subset enumeration: a current subset
/// size `r` and a live `Combinations` cursor over the filtered source at
/// that size. `next()` checks each combination as it is pulled and only
/// advances `r` once the current size's combinations are exhausted,
/// rather than scoring every subset of every size before returning one.
pub struct FromSolutionIter<'ctx> {
    rule: FromRule,
    filtered: Vec<&'ctx CourseInstance>,
    r: usize,
    n: usize,
    combos: Option<Combinations<std::vec::IntoIter<&'ctx CourseInstance>>>,
    emitted_any: bool,
    exhausted: bool,
}

impl<'ctx> FromSolutionIter<'ctx> {
    fn new(rule: FromRule, filtered: Vec<&'ctx CourseInstance>) -> Self {
        let n = filtered.len();
        FromSolutionIter { rule, filtered, r: 0, n, combos: None, emitted_any: false, exhausted: false }
    }
}

impl<'ctx> Iterator for FromSolutionIter<'ctx> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        if self.exhausted {
            return None;
        }

        loop {
            if self.combos.is_none() {
                if self.r > self.n {
                    self.exhausted = true;
                    if !self.emitted_any {
                        self.emitted_any = true;
                        let bound = self
                            .rule
                            .assertion
                            .compare_and_resolve_with(&self.filtered, vec![])
                            .unwrap_or_else(|_| BoundAssertion::overridden(self.rule.path.clone(), None));
                        return Some(Solution::From(FromSolution {
                            rule: self.rule.clone(),
                            matched: self.filtered.iter().map(|c| c.clbid.clone()).collect(),
                            bound,
                            area_sourced: false,
                        }));
                    }
                    return None;
                }
                self.combos = Some(self.filtered.clone().into_iter().combinations(self.r));
            }

            match self.combos.as_mut().unwrap().next() {
                Some(combo) => {
                    if let Ok(bound) = self.rule.assertion.compare_and_resolve_with(&combo, vec![]) {
                        if bound.ok {
                            self.emitted_any = true;
                            return Some(Solution::From(FromSolution {
                                rule: self.rule.clone(),
                                matched: combo.iter().map(|c| c.clbid.clone()).collect(),
                                bound,
                                area_sourced: false,
                            }));
                        }
                    }
                }
                None => {
                    self.combos = None;
                    self.r += 1;
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FromSolution {
    pub rule: FromRule,
    pub matched: Vec<Clbid>,
    pub bound: BoundAssertion,
    area_sourced: bool,
}

pub type FromResult = ResultNode;

impl FromSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        let path = self.rule.path.clone();

        if self.area_sourced {
            return ResultNode {
                path,
                ok: self.bound.ok,
                rank: self.bound.rank,
                max_rank: 1.0,
                detail: ResultDetail::From {
                    matched: Vec::new(),
                    assertions: vec![self.bound.clone()],
                },
            };
        }

        let mut claim_conflict = false;
        if self.rule.claim {
            for clbid in &self.matched {
                if let Some(course) = ctx.transcript.find_by_clbid(clbid) {
                    let outcome = ctx.make_claim(clbid, &course.course(), &path, self.rule.allow_claimed);
                    if let ClaimOutcome::Conflict { .. } = outcome {
                        claim_conflict = true;
                    }
                }
            }
        }

        let inserted_courses: Vec<&CourseInstance> = ctx
            .exceptions
            .insertions(&path)
            .iter()
            .filter_map(|e| match &e.kind {
                ExceptionKind::Insert { clbid, .. } => ctx.transcript.find_by_clbid(clbid),
                _ => None,
            })
            .collect();

        let matched_courses: Vec<&CourseInstance> =
            self.matched.iter().filter_map(|c| ctx.transcript.find_by_clbid(c)).collect();

        let bound = self
            .rule
            .assertion
            .compare_and_resolve_with(&matched_courses, inserted_courses)
            .unwrap_or_else(|_| self.bound.clone());

        ResultNode {
            path,
            ok: bound.ok && !claim_conflict,
            rank: bound.rank,
            max_rank: 1.0,
            detail: ResultDetail::From {
                matched: self.matched.clone(),
                assertions: vec![bound],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::MulticountableTable;
    use crate::clause::{Key, Operator, SingleClause};
    use crate::context::RequirementContext;
    use crate::course::{CourseCode, CourseInstance, Transcript};
    use crate::exception::ExceptionSet;
    use crate::grade::{Grade, GradeOption};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn spm_course(clbid: &str) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse("ARTS 101").unwrap(),
            shorthand: None,
            credits: Decimal::ONE,
            grade: Some(Grade::A),
            grade_option: GradeOption::Graded,
            is_in_progress: false,
            attempted: true,
            earned: true,
            term: 1,
            gereqs: vec!["SPM".to_string()],
            attributes: vec![],
            source: None,
        }
    }

    fn from_rule(op: Operator, expected: i64) -> FromRule {
        FromRule {
            source: FromSource::StudentCourses,
            where_clause: Some(Clause::Single(SingleClause {
                key: Key::GenEd("SPM".into()),
                operator: Operator::In,
                expected: Value::Strings(vec!["SPM".into()]),
            })),
            repeats: RepeatMode::All,
            assertion: Assertion {
                aggregation: crate::assertion::Aggregation::Count,
                where_clause: None,
                clause: SingleClause {
                    key: Key::Count,
                    operator: op,
                    expected: Value::Integer(expected),
                },
                path: Path::root(),
                message: None,
            },
            allow_claimed: false,
            claim: true,
            limit: LimitSet::default(),
            path: Path::new(["$", ".from"]),
        }
    }

    fn ctx_with_three_spm() -> RequirementContext {
        RequirementContext::new(
            Transcript::new(vec![spm_course("1"), spm_course("2"), spm_course("3")]),
            vec![],
            ExceptionSet::default(),
            HashMap::new(),
            MulticountableTable::default(),
        )
    }

    #[test]
    fn equal_one_yields_three_singleton_solutions() {
        let ctx = ctx_with_three_spm();
        let rule = from_rule(Operator::EqualTo, 1);
        let solutions: Vec<_> = rule.solutions(&ctx).collect();
        assert_eq!(solutions.len(), 3);
        for s in &solutions {
            if let Solution::From(f) = s {
                assert_eq!(f.matched.len(), 1);
            }
        }
    }

    #[test]
    fn less_than_three_yields_seven_solutions() {
        let ctx = ctx_with_three_spm();
        let rule = from_rule(Operator::LessThan, 3);
        let solutions: Vec<_> = rule.solutions(&ctx).collect();
        assert_eq!(solutions.len(), 7);
    }

    #[test]
    fn greater_than_one_yields_four_solutions_of_size_two_and_three() {
        let ctx = ctx_with_three_spm();
        let rule = from_rule(Operator::GreaterThan, 1);
        let solutions: Vec<_> = rule.solutions(&ctx).collect();
        assert_eq!(solutions.len(), 4);
        let sizes: Vec<usize> = solutions
            .iter()
            .map(|s| match s {
                Solution::From(f) => f.matched.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(sizes, vec![2, 2, 2, 3]);
    }

    #[test]
    fn unsatisfiable_filter_yields_one_empty_solution() {
        let ctx = ctx_with_three_spm();
        let mut rule = from_rule(Operator::GreaterThanOrEqualTo, 1);
        rule.where_clause = Some(Clause::Single(SingleClause {
            key: Key::GenEd("WR".into()),
            operator: Operator::In,
            expected: Value::Strings(vec!["WR".into()]),
        }));
        let solutions: Vec<_> = rule.solutions(&ctx).collect();
        assert_eq!(solutions.len(), 1);
        if let Solution::From(f) = &solutions[0] {
            assert_eq!(f.matched.len(), 0);
        }
    }
}
