//! The exception model: waive, override, and insert exceptions attached
//! to a specific rule path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::course::Clbid;
use crate::path::Path;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExceptionKind {
    /// The node at `path` is treated as Ok without evaluating its subtree.
    Waive,
    /// Identical effect to `Waive` for a `Requirement`; kept distinct
    /// because the two exception kinds are reported differently
    /// upstream.
    Override,
    /// Synthesizes an extra claimed course at `path`.
    Insert {
        clbid: Clbid,
        #[serde(default)]
        forced: bool,
    },
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Exception {
    pub path: Path,
    #[serde(flatten)]
    pub kind: ExceptionKind,
}

#[derive(Clone, Debug, Default)]
pub struct ExceptionSet {
    by_path: HashMap<Path, Vec<Exception>>,
}

impl ExceptionSet {
    pub fn new(exceptions: Vec<Exception>) -> Self {
        let mut by_path: HashMap<Path, Vec<Exception>> = HashMap::new();
        for e in exceptions {
            by_path.entry(e.path.clone()).or_default().push(e);
        }
        ExceptionSet { by_path }
    }

    pub fn at(&self, path: &Path) -> &[Exception] {
        self.by_path.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_waived(&self, path: &Path) -> bool {
        self.at(path)
            .iter()
            .any(|e| matches!(e.kind, ExceptionKind::Waive | ExceptionKind::Override))
    }

    pub fn insertions(&self, path: &Path) -> Vec<&Exception> {
        self.at(path)
            .iter()
            .filter(|e| matches!(e.kind, ExceptionKind::Insert { .. }))
            .collect()
    }

    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.by_path.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waive_and_override_both_count_as_waived() {
        let set = ExceptionSet::new(vec![Exception {
            path: Path::new(["$", ".count", "[0]"]),
            kind: ExceptionKind::Override,
        }]);
        assert!(set.is_waived(&Path::new(["$", ".count", "[0]"])));
    }

    #[test]
    fn insertions_filters_by_kind() {
        let path = Path::new(["$", ".count"]);
        let set = ExceptionSet::new(vec![
            Exception {
                path: path.clone(),
                kind: ExceptionKind::Waive,
            },
            Exception {
                path: path.clone(),
                kind: ExceptionKind::Insert {
                    clbid: "123".to_string(),
                    forced: true,
                },
            },
        ]);
        assert_eq!(set.insertions(&path).len(), 1);
    }
}
