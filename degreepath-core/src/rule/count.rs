//! The Count rule: the combinatorial core. `count` of `n` children must
//! be Ok (or exactly `count` under `at_most`), with override
//! short-circuiting, insertion exceptions, a potential filter, a
//! disjoint-subtree optimisation at the top level, and r-combination
//! enumeration — grounded in `original_source`'s `rule/count.py` and
//! `solution/count.py`.

use std::collections::HashSet;

use itertools::{Combinations, Itertools, MultiProduct};
use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::context::RequirementContext;
use crate::course::Clbid;
use crate::exception::ExceptionKind;
use crate::path::{sort_by_path, Path};

use super::course::CourseRule;
use super::{ResultDetail, ResultNode, Rule, Solution, SolutionIter};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CountRule {
    pub count: usize,
    #[serde(default)]
    pub at_most: bool,
    pub of: Vec<Rule>,
    #[serde(default)]
    pub audit: Vec<Assertion>,
    pub path: Path,
    /// Only top-level Count rules (the area's own `result` node, or any
    /// rule the loader marks) run the disjoint-subtree optimisation.
    #[serde(default)]
    pub is_top_level: bool,
}

impl CountRule {
    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        if ctx.exceptions.is_waived(&self.path) || !ctx.exceptions.insertions(&self.path).is_empty() {
            return true;
        }
        self.of.iter().any(|c| c.has_potential(ctx))
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        let mut out = HashSet::new();
        for child in &self.of {
            out.extend(child.all_matches(ctx));
        }
        out
    }

    /// Synthesizes insertion children and returns the effective
    /// `(count, children)` pair, keeping the "all" rule an "all" rule by
    /// appending then incrementing rather than replacing a slot.
    fn effective_children_and_count(&self, ctx: &RequirementContext) -> (usize, Vec<Rule>) {
        let mut children = self.of.clone();
        let mut count = self.count;
        let was_all_rule = !self.at_most && self.count == self.of.len() && self.count > 1;

        for (i, exception) in ctx.exceptions.insertions(&self.path).into_iter().enumerate() {
            if let ExceptionKind::Insert { clbid, .. } = &exception.kind {
                let course_code = ctx
                    .transcript
                    .find_by_clbid(clbid)
                    .map(|c| c.course())
                    .unwrap_or_else(|| clbid.clone());
                let child_path = self.path.child(format!("*insert[{}]", i));
                children.push(Rule::Course(CourseRule::synthetic_insertion(
                    course_code,
                    clbid.clone(),
                    child_path,
                )));
                if was_all_rule {
                    count += 1;
                }
            }
        }

        (count, children)
    }

    pub fn solutions<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        if ctx.exceptions.is_waived(&self.path) {
            return SolutionIter::one(Solution::Count(Box::new(CountSolution {
                path: self.path.clone(),
                audit: self.audit.clone(),
                kind: CountSolutionKind::Overridden { children: self.of.clone() },
            })));
        }

        let (count, children) = self.effective_children_and_count(ctx);

        let potential: Vec<Rule> = children.iter().filter(|c| c.has_potential(ctx)).cloned().collect();

        if potential.is_empty() {
            return SolutionIter::one(Solution::Count(Box::new(CountSolution {
                path: self.path.clone(),
                audit: self.audit.clone(),
                kind: CountSolutionKind::Plain {
                    selected: children.clone(),
                    required_count: count,
                    at_most: self.at_most,
                    child_solutions: Vec::new(),
                },
            })));
        }

        let mut frozen: Vec<ResultNode> = Vec::new();
        let mut rump = potential.clone();

        if self.is_top_level && self.audit.is_empty() && potential.len() > 1 {
            let (disjoint, remaining) = partition_disjoint(&potential, ctx);
            rump = remaining;
            for child in disjoint {
                let snapshot = ctx.snapshot_claims();
                let best = best_solution(&child, ctx);
                ctx.restore_claims(snapshot);
                if let Some(best) = best {
                    frozen.push(best);
                }
            }
        }

        let r_start = count.saturating_sub(frozen.len());
        let r_end = if self.at_most { r_start + 1 } else { rump.len() + 1 };
        let r_end = r_end.max(r_start).min(rump.len() + 1);

        SolutionIter::Count(Box::new(CountSolutionIter::new(
            ctx,
            self.path.clone(),
            self.audit.clone(),
            children,
            count,
            self.at_most,
            frozen,
            rump,
            r_start,
            r_end,
        )))
    }
}

/// Resumable state for a Count rule's combinatorial enumeration: a
/// current `r` (subset size), a live `Combinations` cursor over that
/// size, and — once a combination is staged — a live `MultiProduct`
/// cursor over its children's candidate solutions. `next()` advances
/// whichever cursor is innermost-exhausted, one step at a time, instead
/// of ever building the cross product of every combination up front.
pub struct CountSolutionIter<'ctx> {
    ctx: &'ctx RequirementContext,
    path: Path,
    audit: Vec<Assertion>,
    children: Vec<Rule>,
    required_count: usize,
    at_most: bool,
    frozen: Vec<ResultNode>,
    rump: Vec<Rule>,
    r: usize,
    r_end: usize,
    combos: Option<Combinations<std::vec::IntoIter<Rule>>>,
    current_combo: Vec<Rule>,
    product: Option<MultiProduct<std::vec::IntoIter<Solution>>>,
    emitted_any: bool,
    exhausted: bool,
}

impl<'ctx> CountSolutionIter<'ctx> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: &'ctx RequirementContext,
        path: Path,
        audit: Vec<Assertion>,
        children: Vec<Rule>,
        required_count: usize,
        at_most: bool,
        frozen: Vec<ResultNode>,
        rump: Vec<Rule>,
        r_start: usize,
        r_end: usize,
    ) -> Self {
        CountSolutionIter {
            ctx,
            path,
            audit,
            children,
            required_count,
            at_most,
            frozen,
            rump,
            r: r_start,
            r_end,
            combos: None,
            current_combo: Vec::new(),
            product: None,
            emitted_any: false,
            exhausted: false,
        }
    }

    fn next_combo(&mut self) -> Option<Vec<Rule>> {
        loop {
            if self.combos.is_none() {
                if self.r >= self.r_end {
                    return None;
                }
                self.combos = Some(self.rump.clone().into_iter().combinations(self.r));
            }
            match self.combos.as_mut().unwrap().next() {
                Some(combo) => return Some(combo),
                None => {
                    self.combos = None;
                    self.r += 1;
                }
            }
        }
    }
}

impl<'ctx> Iterator for CountSolutionIter<'ctx> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        if self.exhausted {
            return None;
        }

        loop {
            if let Some(product) = self.product.as_mut() {
                if let Some(tuple) = product.next() {
                    self.emitted_any = true;
                    return Some(Solution::Count(Box::new(CountSolution {
                        path: self.path.clone(),
                        audit: self.audit.clone(),
                        kind: CountSolutionKind::Combinatorial {
                            frozen: self.frozen.clone(),
                            selected: sorted_by_path(tuple),
                            unselected: unselected(&self.children, &self.current_combo),
                            required_count: self.required_count,
                            at_most: self.at_most,
                        },
                    })));
                }
                self.product = None;
            }

            let combo = match self.next_combo() {
                Some(combo) => combo,
                None => {
                    self.exhausted = true;
                    if !self.emitted_any {
                        self.emitted_any = true;
                        return Some(Solution::Count(Box::new(CountSolution {
                            path: self.path.clone(),
                            audit: self.audit.clone(),
                            kind: CountSolutionKind::Plain {
                                selected: self.children.clone(),
                                required_count: self.required_count,
                                at_most: self.at_most,
                                child_solutions: Vec::new(),
                            },
                        })));
                    }
                    return None;
                }
            };

            let mut iters: Vec<Vec<Solution>> = Vec::new();
            for child in &combo {
                let mut sols: Vec<Solution> = child.solutions(self.ctx).collect();
                if sols.is_empty() {
                    sols.push(placeholder_solution(child.path().clone()));
                }
                iters.push(sols);
            }
            self.current_combo = combo;
            self.product = Some(iters.into_iter().multi_cartesian_product());
        }
    }
}

fn sorted_by_path(mut solutions: Vec<Solution>) -> Vec<Solution> {
    sort_by_path(&mut solutions, solution_path);
    solutions
}

fn solution_path(solution: &Solution) -> &Path {
    match solution {
        Solution::Course(s) => &s.rule.path,
        Solution::Count(s) => &s.path,
        Solution::From(s) => &s.rule.path,
        Solution::Requirement(s) => &s.path,
        Solution::Reference(s) => &s.path,
        Solution::Assertion(s) => &s.rule.path,
    }
}

fn placeholder_solution(path: Path) -> Solution {
    Solution::Count(Box::new(CountSolution {
        path: path.clone(),
        audit: Vec::new(),
        kind: CountSolutionKind::Plain {
            selected: Vec::new(),
            required_count: 1,
            at_most: false,
            child_solutions: Vec::new(),
        },
    }))
}

fn unselected(all: &[Rule], selected: &[Rule]) -> Vec<Rule> {
    let selected_paths: HashSet<&Path> = selected.iter().map(|r| r.path()).collect();
    all.iter().filter(|r| !selected_paths.contains(r.path())).cloned().collect()
}

/// Partitions `children` into those whose `all_matches` set is disjoint
/// from every other child's, versus the rump that must be solved
/// combinatorially.
fn partition_disjoint(children: &[Rule], ctx: &RequirementContext) -> (Vec<Rule>, Vec<Rule>) {
    let match_sets: Vec<HashSet<Clbid>> = children.iter().map(|c| c.all_matches(ctx)).collect();
    let mut disjoint = Vec::new();
    let mut rump = Vec::new();

    for (i, child) in children.iter().enumerate() {
        let is_disjoint = match_sets
            .iter()
            .enumerate()
            .all(|(j, other)| i == j || match_sets[i].is_disjoint(other));
        if is_disjoint {
            disjoint.push(child.clone());
        } else {
            rump.push(child.clone());
        }
    }

    (disjoint, rump)
}

/// Finds the highest-ranked audited solution for a single rule, used by
/// the disjoint-subtree optimisation to freeze each independent child's
/// best result once.
fn best_solution(rule: &Rule, ctx: &RequirementContext) -> Option<ResultNode> {
    let mut best: Option<ResultNode> = None;
    for solution in rule.solutions(ctx) {
        ctx.reset_claims();
        let result = solution.audit(ctx);
        let is_ok = result.ok();
        let better = match &best {
            None => true,
            Some(b) => result.rank() > b.rank(),
        };
        if better {
            best = Some(result);
        }
        if is_ok {
            break;
        }
    }
    best
}

#[derive(Clone, Debug)]
pub enum CountSolutionKind {
    Overridden {
        children: Vec<Rule>,
    },
    Plain {
        selected: Vec<Rule>,
        required_count: usize,
        at_most: bool,
        child_solutions: Vec<Solution>,
    },
    Combinatorial {
        frozen: Vec<ResultNode>,
        selected: Vec<Solution>,
        unselected: Vec<Rule>,
        required_count: usize,
        at_most: bool,
    },
}

#[derive(Clone, Debug)]
pub struct CountSolution {
    pub path: Path,
    pub audit: Vec<Assertion>,
    pub kind: CountSolutionKind,
}

pub type CountResult = ResultNode;

impl CountSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        match &self.kind {
            CountSolutionKind::Overridden { children } => ResultNode {
                path: self.path.clone(),
                ok: true,
                rank: children.len() as f64 + 1.0,
                max_rank: children.len() as f64 + 1.0,
                detail: ResultDetail::Count {
                    children: Vec::new(),
                    satisfied_count: children.len(),
                    required_count: children.len(),
                    at_most: false,
                    audit: Vec::new(),
                },
            },

            CountSolutionKind::Plain { selected, required_count, at_most, .. } => {
                let mut child_results = Vec::new();
                for child in selected {
                    for solution in child.solutions(ctx).take(1) {
                        child_results.push(solution.audit(ctx));
                    }
                }
                self.finish(child_results, *required_count, *at_most, ctx)
            }

            CountSolutionKind::Combinatorial { frozen, selected, unselected, required_count, at_most } => {
                let mut child_results: Vec<ResultNode> = frozen.clone();
                for solution in selected {
                    child_results.push(solution.audit(ctx));
                }
                for rule in unselected {
                    for solution in rule.solutions(ctx).take(1) {
                        child_results.push(solution.audit(ctx));
                    }
                }
                self.finish(child_results, *required_count, *at_most, ctx)
            }
        }
    }

    fn finish(
        &self,
        mut children: Vec<ResultNode>,
        required_count: usize,
        at_most: bool,
        ctx: &RequirementContext,
    ) -> ResultNode {
        sort_by_path(&mut children, |r| &r.path);

        let satisfied = children.iter().filter(|c| c.ok()).count();
        let count_ok = if at_most { satisfied == required_count } else { satisfied >= required_count };

        let matched: Vec<&crate::course::CourseInstance> = children
            .iter()
            .flat_map(super::collect_clbids)
            .filter_map(|c| ctx.transcript.find_by_clbid(&c))
            .collect();

        let mut bound_assertions = Vec::new();
        let mut audit_ok = true;
        for assertion in &self.audit {
            let inserted: Vec<&crate::course::CourseInstance> = ctx
                .exceptions
                .insertions(&assertion.path)
                .iter()
                .filter_map(|e| match &e.kind {
                    ExceptionKind::Insert { clbid, .. } => ctx.transcript.find_by_clbid(clbid),
                    _ => None,
                })
                .collect();
            if let Ok(bound) = assertion.compare_and_resolve_with(&matched, inserted) {
                audit_ok &= bound.ok;
                bound_assertions.push(bound);
            }
        }

        let ok = count_ok && audit_ok;
        let child_rank: f64 = children.iter().map(|c| c.rank()).sum();
        let audit_rank: f64 = bound_assertions.iter().map(|b| b.rank).sum();
        let bonus = if ok { 1.0 } else { 0.0 };
        let rank = child_rank + audit_rank + bonus;
        let max_rank = children.iter().map(|c| c.max_rank()).sum::<f64>() + self.audit.len() as f64 + 1.0;

        ResultNode {
            path: self.path.clone(),
            ok,
            rank,
            max_rank,
            detail: ResultDetail::Count {
                children,
                satisfied_count: satisfied,
                required_count,
                at_most,
                audit: bound_assertions,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::MulticountableTable;
    use crate::context::RequirementContext;
    use crate::course::{CourseCode, CourseInstance, RepeatMode, Transcript};
    use crate::exception::{Exception, ExceptionKind, ExceptionSet};
    use crate::grade::{Grade, GradeOption};
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

    fn course_rule(code: &str, path_tag: &str) -> Rule {
        Rule::Course(CourseRule {
            course: code.to_string(),
            grade: None,
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$", path_tag]),
        })
    }

    fn ctx(courses: Vec<CourseInstance>, exceptions: ExceptionSet) -> RequirementContext {
        RequirementContext::new(Transcript::new(courses), vec![], exceptions, HashMap::new(), MulticountableTable::default())
    }

    #[test]
    fn count_zero_is_always_ok_with_no_children() {
        let rule = CountRule {
            count: 0,
            at_most: false,
            of: Vec::new(),
            audit: Vec::new(),
            path: Path::new(["$", ".count"]),
            is_top_level: false,
        };
        let context = ctx(Vec::new(), ExceptionSet::default());
        let solutions: Vec<_> = rule.solutions(&context).collect();
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].audit(&context).ok());
    }

    #[test]
    fn at_most_with_zero_potential_children_yields_one_failing_solution() {
        let rule = CountRule {
            count: 1,
            at_most: true,
            of: vec![course_rule("CSCI 999", "*CSCI 999")],
            audit: Vec::new(),
            path: Path::new(["$", ".count"]),
            is_top_level: false,
        };
        let context = ctx(Vec::new(), ExceptionSet::default());
        let solutions: Vec<_> = rule.solutions(&context).collect();
        assert_eq!(solutions.len(), 1);
        assert!(!solutions[0].audit(&context).ok());
    }

    #[test]
    fn insertion_on_an_all_rule_grows_both_count_and_children_by_one() {
        let rule = CountRule {
            count: 2,
            at_most: false,
            of: vec![course_rule("CSCI 111", "*CSCI 111"), course_rule("CSCI 112", "*CSCI 112")],
            audit: Vec::new(),
            path: Path::new(["$", ".count"]),
            is_top_level: false,
        };
        let exceptions = ExceptionSet::new(vec![Exception {
            path: Path::new(["$", ".count"]),
            kind: ExceptionKind::Insert { clbid: "9".to_string(), forced: false },
        }]);
        let context = ctx(vec![course("9", "CSCI 113")], exceptions);
        let (count, children) = rule.effective_children_and_count(&context);
        assert_eq!(count, 3);
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn combinatorial_enumeration_is_pulled_one_solution_at_a_time() {
        let rule = CountRule {
            count: 1,
            at_most: false,
            of: vec![course_rule("CSCI 111", "*CSCI 111"), course_rule("CSCI 112", "*CSCI 112"), course_rule("CSCI 113", "*CSCI 113")],
            audit: Vec::new(),
            path: Path::new(["$", ".count"]),
            is_top_level: false,
        };
        let context = ctx(vec![course("1", "CSCI 111"), course("2", "CSCI 112"), course("3", "CSCI 113")], ExceptionSet::default());
        let mut iter = rule.solutions(&context);
        let first = iter.next();
        assert!(first.is_some());
        context.reset_claims();
        let result = first.unwrap().audit(&context);
        assert!(result.ok());
    }
}
