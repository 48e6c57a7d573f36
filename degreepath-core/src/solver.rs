//! The solver driver: iterates restricted transcripts, pulling each
//! rule's `SolutionIter` one candidate at a time, tracks the best-by-rank
//! result seen so far, and returns as soon as a candidate audits `ok`
//! without ever forcing the rest of that rule's combinatorial candidate
//! space into existence.

use tracing::{debug, info_span};

use crate::area::{common_major_requirement_results, AreaResult, AreaSpec};
use crate::area_pointer::AreaPointer;
use crate::claim::MulticountableTable;
use crate::context::RequirementContext;
use crate::course::Transcript;
use crate::exception::ExceptionSet;
use crate::rule::ResultNode;

pub fn solve(area: &AreaSpec, transcript: &Transcript, pointers: &[AreaPointer], exceptions: &ExceptionSet) -> AreaResult {
    let restricted = area.limit.restricted_transcripts(transcript);
    let mut best: Option<ResultNode> = None;
    let mut best_transcript: Option<Transcript> = None;
    let mut best_rank = f64::NEG_INFINITY;

    for (i, restricted_transcript) in restricted.iter().enumerate() {
        let span = info_span!("restricted_transcript", index = i, courses = restricted_transcript.len());
        let _enter = span.enter();

        let ctx = RequirementContext::new(
            restricted_transcript.clone(),
            pointers.to_vec(),
            exceptions.clone(),
            build_requirement_map(area),
            area.multicountable.clone(),
        );

        for solution in area.result.solutions(&ctx) {
            ctx.reset_claims();
            let result = solution.audit(&ctx);
            debug!(rank = result.rank(), ok = result.ok(), "audited candidate solution");

            if result.rank() > best_rank {
                best_rank = result.rank();
                best = Some(result.clone());
                best_transcript = Some(restricted_transcript.clone());
            }

            if result.ok() {
                let final_ctx = RequirementContext::new(
                    restricted_transcript.clone(),
                    pointers.to_vec(),
                    exceptions.clone(),
                    build_requirement_map(area),
                    area.multicountable.clone(),
                );
                return finalize(area, &final_ctx, result);
            }
        }
    }

    match (best, best_transcript) {
        (Some(result), Some(winning_transcript)) => {
            let ctx = RequirementContext::new(
                winning_transcript,
                pointers.to_vec(),
                exceptions.clone(),
                build_requirement_map(area),
                area.multicountable.clone(),
            );
            finalize(area, &ctx, result)
        }
        _ => AreaResult { ok: false, rank: 0.0, max_rank: 0.0, node: None },
    }
}

fn build_requirement_map(area: &AreaSpec) -> std::collections::HashMap<String, std::rc::Rc<crate::rule::RequirementRule>> {
    area.requirements
        .iter()
        .map(|(name, rule)| (name.clone(), std::rc::Rc::new(rule.clone())))
        .collect()
}

fn finalize(area: &AreaSpec, ctx: &RequirementContext, result: ResultNode) -> AreaResult {
    let common = common_major_requirement_results(area, ctx);
    let common_ok = common.iter().all(|r| r.ok());
    let common_rank: f64 = common.iter().map(|r| r.rank()).sum();
    let common_max: f64 = common.iter().map(|r| r.max_rank()).sum();

    AreaResult {
        ok: result.ok() && common_ok,
        rank: result.rank() + common_rank,
        max_rank: result.max_rank() + common_max,
        node: Some(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_pointer::AreaStatus;
    use crate::claim::MulticountableTable;
    use crate::course::{CourseCode, CourseInstance, Transcript};
    use crate::exception::ExceptionSet;
    use crate::grade::{Grade, GradeOption};
    use crate::path::Path;
    use crate::rule::course::CourseRule;
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

    fn course_rule(code: &str) -> Rule {
        Rule::Course(CourseRule {
            course: code.to_string(),
            grade: None,
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: crate::course::RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$".to_string(), format!("*{}", code)]),
        })
    }

    fn area(result: Rule) -> AreaSpec {
        AreaSpec {
            name: "Test Area".to_string(),
            kind: AreaKind::Degree,
            code: "TEST".to_string(),
            degree: "B.A.".to_string(),
            result,
            requirements: HashMap::new(),
            emphases: HashMap::new(),
            limit: LimitSet::default(),
            multicountable: MulticountableTable::default(),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn solve_returns_ok_when_a_satisfying_solution_exists() {
        let area = area(course_rule("CSCI 251"));
        let transcript = Transcript::new(vec![course("1", "CSCI 251")]);
        let result = solve(&area, &transcript, &[], &ExceptionSet::default());
        assert!(result.ok);
    }

    #[test]
    fn solve_returns_best_rank_failure_when_nothing_satisfies() {
        let area = area(course_rule("CSCI 251"));
        let transcript = Transcript::new(vec![course("1", "MATH 101")]);
        let result = solve(&area, &transcript, &[], &ExceptionSet::default());
        assert!(!result.ok);
        assert!(result.node.is_some());
    }

    #[test]
    fn solve_is_deterministic_across_repeated_runs() {
        let area = area(course_rule("CSCI 251"));
        let transcript = Transcript::new(vec![course("1", "CSCI 251"), course("2", "CSCI 251")]);
        let first = solve(&area, &transcript, &[], &ExceptionSet::default());
        let second = solve(&area, &transcript, &[], &ExceptionSet::default());
        assert_eq!(first.ok, second.ok);
        assert_eq!(first.rank, second.rank);
    }

    #[test]
    fn non_major_area_carries_no_common_requirement_results() {
        let mut spec = area(course_rule("CSCI 251"));
        spec.kind = AreaKind::Degree;
        let transcript = Transcript::new(vec![course("1", "CSCI 251")]);
        let pointers = vec![AreaPointer {
            code: "TEST".to_string(),
            status: AreaStatus::Declared,
            kind: AreaKind::Degree,
            name: "Test Area".to_string(),
            degree: "B.A.".to_string(),
            department: None,
            gpa: None,
        }];
        let result = solve(&spec, &transcript, &pointers, &ExceptionSet::default());
        assert!(result.ok);
        assert_eq!(result.rank, result.node.as_ref().unwrap().rank());
    }
}
