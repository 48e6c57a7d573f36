//! The Requirement rule: a named node wrapping at most one child rule,
//! short-circuited by a waiver or by external audited-by evidence,
//! grounded in `original_source`'s `result/requirement.py`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::context::RequirementContext;
use crate::course::Clbid;
use crate::path::Path;

use super::{collect_clbids, Rule, ResultDetail, ResultNode, Solution, SolutionIter};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditedBy {
    Registrar,
    Interview,
    Override,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RequirementRule {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub audited_by: Option<AuditedBy>,
    #[serde(default)]
    pub in_gpa: bool,
    #[serde(default)]
    pub contract: bool,
    #[serde(default)]
    pub child: Option<Rule>,
    pub path: Path,
}

impl RequirementRule {
    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        if ctx.exceptions.is_waived(&self.path) || self.audited_by.is_some() {
            return true;
        }
        match &self.child {
            Some(child) => child.has_potential(ctx),
            None => false,
        }
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        match &self.child {
            Some(child) => child.all_matches(ctx),
            None => HashSet::new(),
        }
    }

    pub fn solutions<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        if ctx.exceptions.is_waived(&self.path) {
            return SolutionIter::one(Solution::Requirement(Box::new(RequirementSolution {
                name: self.name.clone(),
                path: self.path.clone(),
                kind: RequirementSolutionKind::Waived,
            })));
        }

        if self.audited_by.is_some() && self.child.is_none() {
            return SolutionIter::one(Solution::Requirement(Box::new(RequirementSolution {
                name: self.name.clone(),
                path: self.path.clone(),
                kind: RequirementSolutionKind::AuditedBy(self.audited_by.unwrap()),
            })));
        }

        let child = match &self.child {
            Some(child) => child,
            None => {
                // Neither a child nor audited_by: `AreaSpec::validate`
                // rejects this shape at load time, but solutions() does
                // not get to assume a validated tree, so it reports the
                // node as failing rather than silently waiving it.
                return SolutionIter::one(Solution::Requirement(Box::new(RequirementSolution {
                    name: self.name.clone(),
                    path: self.path.clone(),
                    kind: RequirementSolutionKind::Invalid,
                })));
            }
        };

        SolutionIter::Requirement(Box::new(RequirementSolutionIter {
            name: self.name.clone(),
            path: self.path.clone(),
            inner: child.solutions(ctx),
        }))
    }
}

/// Wraps a child rule's (lazy) solution sequence in a `Requirement`
/// envelope, one solution at a time.
pub struct RequirementSolutionIter<'ctx> {
    name: String,
    path: Path,
    inner: SolutionIter<'ctx>,
}

impl<'ctx> Iterator for RequirementSolutionIter<'ctx> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        let inner = self.inner.next()?;
        Some(Solution::Requirement(Box::new(RequirementSolution {
            name: self.name.clone(),
            path: self.path.clone(),
            kind: RequirementSolutionKind::Child(Box::new(inner)),
        })))
    }
}

#[derive(Clone, Debug)]
pub enum RequirementSolutionKind {
    Waived,
    AuditedBy(AuditedBy),
    Child(Box<Solution>),
    /// Neither `child` nor `audited_by` was set — a malformed node that
    /// `AreaSpec::validate` should have already rejected.
    Invalid,
}

#[derive(Clone, Debug)]
pub struct RequirementSolution {
    pub name: String,
    pub path: Path,
    pub kind: RequirementSolutionKind,
}

pub type RequirementResult = ResultNode;

impl RequirementSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        match &self.kind {
            RequirementSolutionKind::Waived => ResultNode {
                path: self.path.clone(),
                ok: true,
                rank: 1.0,
                max_rank: 1.0,
                detail: ResultDetail::Requirement {
                    name: self.name.clone(),
                    child: None,
                    audited_by: None,
                    waived: true,
                },
            },
            RequirementSolutionKind::AuditedBy(by) => ResultNode {
                path: self.path.clone(),
                ok: true,
                rank: 1.0,
                max_rank: 1.0,
                detail: ResultDetail::Requirement {
                    name: self.name.clone(),
                    child: None,
                    audited_by: Some(format!("{:?}", by).to_lowercase()),
                    waived: false,
                },
            },
            RequirementSolutionKind::Invalid => ResultNode {
                path: self.path.clone(),
                ok: false,
                rank: 0.0,
                max_rank: 1.0,
                detail: ResultDetail::Requirement {
                    name: self.name.clone(),
                    child: None,
                    audited_by: None,
                    waived: false,
                },
            },
            RequirementSolutionKind::Child(inner) => {
                let child_result = inner.audit(ctx);
                ctx.record_requirement_result(&self.name, collect_clbids(&child_result));
                ResultNode {
                    path: self.path.clone(),
                    ok: child_result.ok,
                    rank: child_result.rank,
                    max_rank: child_result.max_rank,
                    detail: ResultDetail::Requirement {
                        name: self.name.clone(),
                        child: Some(Box::new(child_result)),
                        audited_by: None,
                        waived: false,
                    },
                }
            }
        }
    }
}
