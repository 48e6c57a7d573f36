//! The Reference rule: delegates to a requirement defined elsewhere in
//! the same area, resolved through the context's
//! requirement map. It never re-enumerates its target's solutions itself
//! — it just forwards the target's own lazily-produced solutions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::context::RequirementContext;
use crate::course::Clbid;
use crate::path::Path;

use super::{ResultDetail, ResultNode, Solution, SolutionIter};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub name: String,
    pub path: Path,
}

impl ReferenceRule {
    fn target<'a>(&self, ctx: &'a RequirementContext) -> Option<&'a crate::rule::RequirementRule> {
        ctx.requirements.get(&self.name).map(|rc| rc.as_ref())
    }

    pub fn has_potential(&self, ctx: &RequirementContext) -> bool {
        self.target(ctx).map(|r| r.has_potential(ctx)).unwrap_or(false)
    }

    pub fn all_matches(&self, ctx: &RequirementContext) -> HashSet<Clbid> {
        self.target(ctx).map(|r| r.all_matches(ctx)).unwrap_or_default()
    }

    pub fn solutions<'ctx>(&self, ctx: &'ctx RequirementContext) -> SolutionIter<'ctx> {
        let target = match self.target(ctx) {
            Some(t) => t,
            None => return SolutionIter::empty(),
        };
        SolutionIter::Reference(Box::new(ReferenceSolutionIter {
            name: self.name.clone(),
            path: self.path.clone(),
            inner: target.solutions(ctx),
        }))
    }
}

/// Wraps the target requirement's own (lazy) solution sequence,
/// forwarding one `Solution` at a time rather than collecting the
/// target's entire candidate space before returning.
pub struct ReferenceSolutionIter<'ctx> {
    name: String,
    path: Path,
    inner: SolutionIter<'ctx>,
}

impl<'ctx> Iterator for ReferenceSolutionIter<'ctx> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        let inner = self.inner.next()?;
        Some(Solution::Reference(Box::new(ReferenceSolution {
            name: self.name.clone(),
            path: self.path.clone(),
            inner,
        })))
    }
}

#[derive(Clone, Debug)]
pub struct ReferenceSolution {
    pub name: String,
    pub path: Path,
    pub inner: Solution,
}

pub type ReferenceResult = ResultNode;

impl ReferenceSolution {
    pub fn audit(&self, ctx: &RequirementContext) -> ResultNode {
        let inner_result = self.inner.audit(ctx);
        ResultNode {
            path: self.path.clone(),
            ok: inner_result.ok,
            rank: inner_result.rank,
            max_rank: inner_result.max_rank,
            detail: ResultDetail::Reference {
                name: self.name.clone(),
                result: Box::new(inner_result),
            },
        }
    }
}
