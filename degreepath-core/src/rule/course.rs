//! The Course rule: matches a single transcript entry against an
//! expected course code, grounded in `original_source`'s
//! `solution/course.py` claim-then-fallback audit flow.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::claim::ClaimOutcome;
use crate::context::RequirementContext;
use crate::course::{Clbid, RepeatMode};
use crate::exception::ExceptionKind;
use crate::grade::{Grade, GradeOption};
use crate::path::Path;

use super::{ResultDetail, ResultNode, Solution, SolutionIter};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CourseRule {
    pub course: String,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub grade_option: Option<GradeOption>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub allow_claimed: bool,
    /// AP/IB/transfer shorthand this rule accepts in lieu of an
    /// institution course with this code.
    #[serde(default)]
    pub ap_ib_source: Option<String>,
    #[serde(default)]
    pub repeats: RepeatMode,
    /// Set only on courses synthesized by the Count rule's insertion
    /// handling — such a course always claims this exact clbid rather
    /// than matching by code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_clbid: Option<Clbid>,
    pub path: Path,
}

impl CourseRule {
    pub fn synthetic_insertion(course_code: String, clbid: Clbid, path: Path) -> CourseRule {
        CourseRule {
            course: course_code,
            grade: None,
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: RepeatMode::All,
            forced_clbid: Some(clbid),
            path,
        }
    }

    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        if self.forced_clbid.is_some() {
            return true;
        }
        if !ctx.exceptions.insertions(&self.path).is_empty() || ctx.exceptions.is_waived(&self.path) {
            return true;
        }
        if let Some(shorthand) = &self.ap_ib_source {
            if ctx.transcript.find_ap_ib(shorthand).is_some() {
                return true;
            }
        }
        !ctx.transcript.find_all(&self.course, self.repeats).is_empty()
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        let mut out = HashSet::new();
        if let Some(clbid) = &self.forced_clbid {
            out.insert(clbid.clone());
            return out;
        }
        if let Some(shorthand) = &self.ap_ib_source {
            if let Some(c) = ctx.transcript.find_ap_ib(shorthand) {
                out.insert(c.clbid.clone());
            }
        }
        for c in ctx.transcript.find_all(&self.course, self.repeats) {
            out.insert(c.clbid.clone());
        }
        out
    }

    /// `solutions` yields exactly one candidate: itself.
    pub fn solutions<'ctx>(&self, _ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        SolutionIter::one(Solution::Course(CourseSolution { rule: self.clone() }))
    }
}

#[derive(Clone, Debug)]
pub struct CourseSolution {
    pub rule: CourseRule,
}

pub type CourseResult = ResultNode;

impl CourseSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        let path = self.rule.path.clone();

        if ctx.exceptions.is_waived(&path) {
            return ResultNode {
                path,
                ok: true,
                rank: 1.0,
                max_rank: 1.0,
                detail: ResultDetail::Course {
                    course: self.rule.course.clone(),
                    matched_clbid: None,
                    claim_conflict: false,
                },
            };
        }

        if let Some(clbid) = &self.rule.forced_clbid {
            ctx.make_claim(clbid, &self.rule.course, &path, self.rule.allow_claimed);
            return ResultNode {
                path,
                ok: true,
                rank: 1.0,
                max_rank: 1.0,
                detail: ResultDetail::Course {
                    course: self.rule.course.clone(),
                    matched_clbid: Some(clbid.clone()),
                    claim_conflict: false,
                },
            };
        }

        for exception in ctx.exceptions.insertions(&path) {
            if let ExceptionKind::Insert { clbid, .. } = &exception.kind {
                ctx.make_claim(clbid, &self.rule.course, &path, self.rule.allow_claimed);
                return ResultNode {
                    path,
                    ok: true,
                    rank: 1.0,
                    max_rank: 1.0,
                    detail: ResultDetail::Course {
                        course: self.rule.course.clone(),
                        matched_clbid: Some(clbid.clone()),
                        claim_conflict: false,
                    },
                };
            }
        }

        let candidates = if let Some(shorthand) = &self.rule.ap_ib_source {
            ctx.transcript.find_ap_ib(shorthand).into_iter().collect()
        } else {
            ctx.transcript.find_all(&self.rule.course, self.rule.repeats)
        };

        let mut had_conflict = false;
        for candidate in candidates {
            if let Some(min_grade) = self.rule.grade {
                match candidate.grade {
                    Some(g) if g >= min_grade => {}
                    _ => continue,
                }
            }
            if let Some(expected_option) = self.rule.grade_option {
                if candidate.grade_option != expected_option {
                    continue;
                }
            }

            match ctx.make_claim(&candidate.clbid, &self.rule.course, &path, self.rule.allow_claimed) {
                ClaimOutcome::Ok => {
                    return ResultNode {
                        path,
                        ok: true,
                        rank: 1.0,
                        max_rank: 1.0,
                        detail: ResultDetail::Course {
                            course: self.rule.course.clone(),
                            matched_clbid: Some(candidate.clbid.clone()),
                            claim_conflict: false,
                        },
                    };
                }
                ClaimOutcome::Conflict { .. } => {
                    had_conflict = true;
                    continue;
                }
            }
        }

        ResultNode {
            path,
            ok: false,
            rank: 0.0,
            max_rank: 1.0,
            detail: ResultDetail::Course {
                course: self.rule.course.clone(),
                matched_clbid: None,
                claim_conflict: had_conflict,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::MulticountableTable;
    use crate::context::RequirementContext;
    use crate::course::{CourseCode, CourseInstance, Transcript};
    use crate::exception::ExceptionSet;
    use crate::grade::GradeOption;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn course(clbid: &str, code: &str, grade: Grade) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse(code).unwrap(),
            shorthand: None,
            credits: Decimal::ONE,
            grade: Some(grade),
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
        RequirementContext::new(
            Transcript::new(courses),
            vec![],
            ExceptionSet::default(),
            HashMap::new(),
            MulticountableTable::default(),
        )
    }

    #[test]
    fn matching_course_with_sufficient_grade_claims_and_passes() {
        let ctx = ctx(vec![course("1", "CSCI 251", Grade::B)]);
        let rule = CourseRule {
            course: "CSCI 251".into(),
            grade: Some(Grade::C),
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$", "*CSCI 251"]),
        };
        let solution = CourseSolution { rule };
        let result = solution.audit(&ctx);
        assert!(result.ok());
        assert_eq!(result.rank(), 1.0);
    }

    #[test]
    fn below_minimum_grade_fails() {
        let ctx = ctx(vec![course("1", "CSCI 251", Grade::D)]);
        let rule = CourseRule {
            course: "CSCI 251".into(),
            grade: Some(Grade::C),
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$", "*CSCI 251"]),
        };
        let solution = CourseSolution { rule };
        let result = solution.audit(&ctx);
        assert!(!result.ok());
    }

    #[test]
    fn already_claimed_course_falls_through_to_conflict() {
        let ctx = ctx(vec![course("1", "CSCI 251", Grade::A)]);
        ctx.make_claim(&"1".to_string(), "CSCI 251", &Path::new(["$", "other"]), false);
        let rule = CourseRule {
            course: "CSCI 251".into(),
            grade: None,
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$", "*CSCI 251"]),
        };
        let solution = CourseSolution { rule };
        let result = solution.audit(&ctx);
        assert!(!result.ok());
    }
}
