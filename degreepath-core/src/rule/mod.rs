//! Rule nodes: Course, Count, From, Requirement, Reference, and a
//! standalone Assertion variant, each implementing the same
//! Rule/Solution/Result phase split over a tagged union rather than a
//! class hierarchy.

pub mod assertion_rule;
pub mod course;
pub mod count;
pub mod from;
pub mod reference;
pub mod requirement;

pub use assertion_rule::{AssertionResult, AssertionRule, AssertionSolution};
pub use course::{CourseResult, CourseRule, CourseSolution};
pub use count::{CountResult, CountRule, CountSolution};
pub use from::{FromResult, FromRule, FromSolution};
pub use reference::{ReferenceResult, ReferenceRule, ReferenceSolution};
pub use requirement::{RequirementResult, RequirementRule, RequirementSolution};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::assertion::BoundAssertion;
use crate::context::RequirementContext;
use crate::course::Clbid;
use crate::path::Path;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Course(CourseRule),
    Count(CountRule),
    From(FromRule),
    Requirement(Box<RequirementRule>),
    Reference(ReferenceRule),
    Assertion(AssertionRule),
}

impl Rule {
    pub fn path(&self) -> &Path {
        match self {
            Rule::Course(r) => &r.path,
            Rule::Count(r) => &r.path,
            Rule::From(r) => &r.path,
            Rule::Requirement(r) => &r.path,
            Rule::Reference(r) => &r.path,
            Rule::Assertion(r) => &r.path,
        }
    }

    /// A conservative static hint that this rule could conceivably
    /// succeed given `ctx`: Course needs a matching transcript row or an
    /// applicable exception; Count/From are potential if any
    /// child/member is; Requirement is potential if its child is, or it
    /// is audited-by.
    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        match self {
            Rule::Course(r) => r.has_potential(ctx),
            Rule::Count(r) => r.has_potential(ctx),
            Rule::From(r) => r.has_potential(ctx),
            Rule::Requirement(r) => r.has_potential(ctx),
            Rule::Reference(r) => r.has_potential(ctx),
            Rule::Assertion(_) => true,
        }
    }

    /// The transcript clbids this rule could possibly claim, used by the
    /// Count rule's disjoint-subtree optimisation.
    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        match self {
            Rule::Course(r) => r.all_matches(ctx),
            Rule::Count(r) => r.all_matches(ctx),
            Rule::From(r) => r.all_matches(ctx),
            Rule::Requirement(r) => r.all_matches(ctx),
            Rule::Reference(r) => r.all_matches(ctx),
            Rule::Assertion(_) => HashSet::new(),
        }
    }

    pub fn solutions<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        match self {
            Rule::Course(r) => r.solutions(ctx),
            Rule::Count(r) => r.solutions(ctx),
            Rule::From(r) => r.solutions(ctx),
            Rule::Requirement(r) => r.solutions(ctx),
            Rule::Reference(r) => r.solutions(ctx),
            Rule::Assertion(r) => r.solutions(ctx),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Solution {
    Course(CourseSolution),
    Count(Box<CountSolution>),
    From(FromSolution),
    Requirement(Box<RequirementSolution>),
    Reference(Box<ReferenceSolution>),
    Assertion(AssertionSolution),
}

impl Solution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        match self {
            Solution::Course(s) => s.audit(ctx),
            Solution::Count(s) => s.audit(ctx),
            Solution::From(s) => s.audit(ctx),
            Solution::Requirement(s) => s.audit(ctx),
            Solution::Reference(s) => s.audit(ctx),
            Solution::Assertion(s) => s.audit(ctx),
        }
    }
}

/// The explicit, pull-driven iterator every rule's `solutions` returns.
/// Each variant is a small state object that resumes from exactly where
/// its last `next()` call left off — a degenerate rule holds at most one
/// pending `Solution`, a combinatorial rule holds live combination/
/// cross-product cursors — so a caller that stops pulling after the
/// first `ok()` solution never forces the rest of the candidate space
/// into existence.
pub enum SolutionIter<'ctx> {
    Empty,
    Once(Option<Solution>),
    Count(Box<count::CountSolutionIter<'ctx>>),
    From(Box<from::FromSolutionIter<'ctx>>),
    Requirement(Box<requirement::RequirementSolutionIter<'ctx>>),
    Reference(Box<reference::ReferenceSolutionIter<'ctx>>),
}

impl<'ctx> SolutionIter<'ctx> {
    pub fn empty() -> Self {
        SolutionIter::Empty
    }

    pub fn one(item: Solution) -> Self {
        SolutionIter::Once(Some(item))
    }
}

impl<'ctx> Iterator for SolutionIter<'ctx> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        match self {
            SolutionIter::Empty => None,
            SolutionIter::Once(slot) => slot.take(),
            SolutionIter::Count(it) => it.next(),
            SolutionIter::From(it) => it.next(),
            SolutionIter::Requirement(it) => it.next(),
            SolutionIter::Reference(it) => it.next(),
        }
    }
}

/// A solution after claim arbitration and assertion evaluation.
/// `rank`/`max_rank` drive the solver's best-by-rank tracking; `ok` is
/// the boolean verdict other rules compose over.
#[derive(Clone, Debug, Serialize)]
pub struct ResultNode {
    pub path: Path,
    pub ok: bool,
    pub rank: f64,
    pub max_rank: f64,
    pub detail: ResultDetail,
}

impl ResultNode {
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn rank(&self) -> f64 {
        self.rank
    }

    pub fn max_rank(&self) -> f64 {
        self.max_rank
    }
}

/// Walks a result subtree collecting the clbids it matched, the data a
/// later `Requirement`'s `last_results` cache needs so a `From` rule's
/// `requirements: [names…]` source can resolve.
pub fn collect_clbids(result: &ResultNode) -> Vec<Clbid> {
    let mut out = Vec::new();
    collect_clbids_into(result, &mut out);
    out
}

fn collect_clbids_into(result: &ResultNode, out: &mut Vec<Clbid>) {
    match &result.detail {
        ResultDetail::Course { matched_clbid, .. } => {
            if let Some(clbid) = matched_clbid {
                out.push(clbid.clone());
            }
        }
        ResultDetail::Count { children, .. } => {
            for child in children {
                collect_clbids_into(child, out);
            }
        }
        ResultDetail::From { matched, .. } => out.extend(matched.iter().cloned()),
        ResultDetail::Requirement { child, .. } => {
            if let Some(child) = child {
                collect_clbids_into(child, out);
            }
        }
        ResultDetail::Reference { result, .. } => collect_clbids_into(result, out),
        ResultDetail::Assertion(_) => {}
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultDetail {
    Course {
        course: String,
        matched_clbid: Option<Clbid>,
        claim_conflict: bool,
    },
    Count {
        children: Vec<ResultNode>,
        satisfied_count: usize,
        required_count: usize,
        at_most: bool,
        audit: Vec<BoundAssertion>,
    },
    From {
        matched: Vec<Clbid>,
        assertions: Vec<BoundAssertion>,
    },
    Requirement {
        name: String,
        child: Option<Box<ResultNode>>,
        audited_by: Option<String>,
        waived: bool,
    },
    Reference {
        name: String,
        result: Box<ResultNode>,
    },
    Assertion(BoundAssertion),
}
