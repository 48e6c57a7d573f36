//! The requirement context: an immutable-per-audit bundle of transcript,
//! area pointers, exceptions, the named-requirement map, and
//! multicountable policy, holding the one mutable piece of per-audit
//! state — the claim registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::area_pointer::AreaPointer;
use crate::claim::{ClaimOutcome, ClaimRegistry, MulticountableTable};
use crate::course::{Clbid, CourseInstance, Transcript};
use crate::exception::ExceptionSet;
use crate::path::Path;
use crate::rule::requirement::RequirementRule;

/// The `RequirementContext` is shared by reference throughout one
/// solution's traversal; the claim registry and the last-results cache
/// are interior-mutable because traversal mutates them while holding only
/// a shared reference to the context itself: the registry is owned
/// exclusively by one context, but mutated throughout traversal.
pub struct RequirementContext {
    pub transcript: Transcript,
    pub pointers: Vec<AreaPointer>,
    pub exceptions: ExceptionSet,
    pub requirements: HashMap<String, Rc<RequirementRule>>,
    pub multicountable: MulticountableTable,
    claims: RefCell<ClaimRegistry>,
    last_results: RefCell<HashMap<String, Vec<Clbid>>>,
}

impl RequirementContext {
    pub fn new(
        transcript: Transcript,
        pointers: Vec<AreaPointer>,
        exceptions: ExceptionSet,
        requirements: HashMap<String, Rc<RequirementRule>>,
        multicountable: MulticountableTable,
    ) -> Self {
        RequirementContext {
            transcript,
            pointers,
            exceptions,
            requirements,
            multicountable,
            claims: RefCell::new(ClaimRegistry::new()),
            last_results: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_transcript(&self, transcript: Transcript) -> Self {
        RequirementContext {
            transcript,
            pointers: self.pointers.clone(),
            exceptions: self.exceptions.clone(),
            requirements: self.requirements.clone(),
            multicountable: self.multicountable.clone(),
            claims: RefCell::new(ClaimRegistry::new()),
            last_results: RefCell::new(self.last_results.borrow().clone()),
        }
    }

    pub fn make_claim(
        &self,
        clbid: &Clbid,
        course_key: &str,
        path: &Path,
        allow_claimed: bool,
    ) -> ClaimOutcome {
        self.claims
            .borrow_mut()
            .make_claim(clbid, course_key, path, allow_claimed, &self.multicountable)
    }

    pub fn reset_claims(&self) {
        self.claims.borrow_mut().reset_claims();
    }

    pub fn snapshot_claims(&self) -> ClaimRegistry {
        self.claims.borrow().snapshot()
    }

    pub fn restore_claims(&self, snapshot: ClaimRegistry) {
        self.claims.borrow_mut().restore(snapshot);
    }

    pub fn primary_claimant_count(&self, clbid: &Clbid) -> usize {
        self.claims.borrow().primary_claimant_count(clbid)
    }

    pub fn record_requirement_result(&self, name: &str, matched: Vec<Clbid>) {
        self.last_results.borrow_mut().insert(name.to_string(), matched);
    }

    /// The concatenated matched items of the named requirements' last
    /// results, for `From`'s `requirements:` source.
    pub fn matched_by_requirements(&self, names: &[String]) -> Vec<&CourseInstance> {
        let cache = self.last_results.borrow();
        let mut out = Vec::new();
        for name in names {
            if let Some(clbids) = cache.get(name) {
                for clbid in clbids {
                    if let Some(course) = self.transcript.find_by_clbid(clbid) {
                        out.push(course);
                    }
                }
            }
        }
        out
    }

    pub fn forced_course_by_clbid(&self, clbid: &str) -> Option<&CourseInstance> {
        self.transcript.find_by_clbid(clbid)
    }
}
