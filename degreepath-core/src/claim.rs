//! The claim registry and its arbitration rule: a process (really,
//! per-audit) record of which (course, path) pairs have been claimed, so
//! no course is silently double-counted across disjoint sub-requirements.

use std::collections::HashMap;

use crate::course::Clbid;
use crate::path::Path;

/// The area-level table permitting specific (course, path-pair)
/// double-counts. Keyed by course code (or clbid — both forms are
/// accepted, clbid takes precedence when present) to the set of path
/// pairs allowed to jointly claim it.
#[derive(Clone, Debug, Default)]
pub struct MulticountableTable {
    entries: HashMap<String, Vec<(Path, Path)>>,
}

impl MulticountableTable {
    pub fn new(entries: HashMap<String, Vec<(Path, Path)>>) -> Self {
        MulticountableTable { entries }
    }

    pub fn permits(&self, course_key: &str, a: &Path, b: &Path) -> bool {
        match self.entries.get(course_key) {
            None => false,
            Some(pairs) => pairs
                .iter()
                .any(|(p1, p2)| (p1 == a && p2 == b) || (p1 == b && p2 == a)),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClaimRecord {
    pub path: Path,
    pub allow_claimed: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ClaimOutcome {
    Ok,
    Conflict { conflicting_with: Vec<ClaimRecord> },
}

impl ClaimOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ClaimOutcome::Ok)
    }
}

/// Single-threaded, mutated in place during one solution's audit; reset
/// between independent solutions, snapshotted/restored around the
/// disjoint-subtree optimisation.
#[derive(Clone, Debug, Default)]
pub struct ClaimRegistry {
    claims: HashMap<Clbid, Vec<ClaimRecord>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        ClaimRegistry::default()
    }

    pub fn make_claim(
        &mut self,
        clbid: &Clbid,
        course_key: &str,
        path: &Path,
        allow_claimed: bool,
        multicountable: &MulticountableTable,
    ) -> ClaimOutcome {
        let existing = self.claims.entry(clbid.clone()).or_default();

        if existing.is_empty() {
            existing.push(ClaimRecord {
                path: path.clone(),
                allow_claimed,
            });
            return ClaimOutcome::Ok;
        }

        if allow_claimed {
            existing.push(ClaimRecord {
                path: path.clone(),
                allow_claimed: true,
            });
            return ClaimOutcome::Ok;
        }

        let primary_conflicts: Vec<ClaimRecord> = existing
            .iter()
            .filter(|c| !c.allow_claimed)
            .cloned()
            .collect();

        if primary_conflicts.is_empty() {
            existing.push(ClaimRecord {
                path: path.clone(),
                allow_claimed,
            });
            return ClaimOutcome::Ok;
        }

        let all_permitted = primary_conflicts
            .iter()
            .all(|prior| multicountable.permits(course_key, path, &prior.path));

        if all_permitted {
            existing.push(ClaimRecord {
                path: path.clone(),
                allow_claimed,
            });
            return ClaimOutcome::Ok;
        }

        ClaimOutcome::Conflict {
            conflicting_with: primary_conflicts,
        }
    }

    pub fn reset_claims(&mut self) {
        self.claims.clear();
    }

    pub fn snapshot(&self) -> ClaimRegistry {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: ClaimRegistry) {
        *self = snapshot;
    }

    pub fn claims_for(&self, clbid: &Clbid) -> &[ClaimRecord] {
        self.claims.get(clbid).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn claims_for_path(&self, path: &Path) -> Vec<(Clbid, ClaimRecord)> {
        self.claims
            .iter()
            .flat_map(|(clbid, records)| {
                records
                    .iter()
                    .filter(|r| &r.path == path)
                    .map(move |r| (clbid.clone(), r.clone()))
            })
            .collect()
    }

    pub fn primary_claimant_count(&self, clbid: &Clbid) -> usize {
        self.claims_for(clbid).iter().filter(|c| !c.allow_claimed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::new([s])
    }

    #[test]
    fn first_claim_succeeds() {
        let mut reg = ClaimRegistry::new();
        let table = MulticountableTable::default();
        let outcome = reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table);
        assert!(outcome.is_ok());
    }

    #[test]
    fn second_primary_claim_conflicts_without_multicountable() {
        let mut reg = ClaimRegistry::new();
        let table = MulticountableTable::default();
        assert!(reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table).is_ok());
        let outcome = reg.make_claim(&"c1".to_string(), "CSCI 251", &p("b"), false, &table);
        assert!(!outcome.is_ok());
    }

    #[test]
    fn multicountable_pair_permits_second_claim() {
        let mut reg = ClaimRegistry::new();
        let mut entries = HashMap::new();
        entries.insert("CSCI 251".to_string(), vec![(p("a"), p("b"))]);
        let table = MulticountableTable::new(entries);
        assert!(reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table).is_ok());
        let outcome = reg.make_claim(&"c1".to_string(), "CSCI 251", &p("b"), false, &table);
        assert!(outcome.is_ok());
    }

    #[test]
    fn allow_claimed_never_conflicts_but_is_not_primary() {
        let mut reg = ClaimRegistry::new();
        let table = MulticountableTable::default();
        assert!(reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table).is_ok());
        let outcome = reg.make_claim(&"c1".to_string(), "CSCI 251", &p("b"), true, &table);
        assert!(outcome.is_ok());
        assert_eq!(reg.primary_claimant_count(&"c1".to_string()), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut reg = ClaimRegistry::new();
        let table = MulticountableTable::default();
        reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table);
        reg.reset_claims();
        assert!(reg.claims_for(&"c1".to_string()).is_empty());
    }

    #[test]
    fn snapshot_restore_roundtrips() {
        let mut reg = ClaimRegistry::new();
        let table = MulticountableTable::default();
        reg.make_claim(&"c1".to_string(), "CSCI 251", &p("a"), false, &table);
        let snap = reg.snapshot();
        reg.make_claim(&"c2".to_string(), "CSCI 252", &p("b"), false, &table);
        reg.restore(snap);
        assert!(reg.claims_for(&"c2".to_string()).is_empty());
        assert!(!reg.claims_for(&"c1".to_string()).is_empty());
    }
}
