//! Node paths: an ordered sequence of tokens that uniquely identifies a rule
//! node within an area tree. Paths key the claim registry, attach
//! exceptions, and give a deterministic sort order for children and
//! solutions.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug, Default)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self {
        Path(vec!["$".to_string()])
    }

    pub fn new(tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Path(tokens.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, token: impl Into<String>) -> Path {
        let mut tokens = self.0.clone();
        tokens.push(token.into());
        Path(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" → "))
    }
}

impl<T: Into<String>> FromIterator<T> for Path {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Path(iter.into_iter().map(Into::into).collect())
    }
}

/// Sorts items by path, the deterministic order required of children
/// and solutions before enumeration.
pub fn sort_by_path<T>(items: &mut [T], path_of: impl Fn(&T) -> &Path) {
    items.sort_by(|a, b| path_of(a).cmp(path_of(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_appends_token() {
        let root = Path::root();
        let child = root.child(".count").child("[2]").child("*CSCI 251");
        assert_eq!(child.tokens(), &["$", ".count", "[2]", "*CSCI 251"]);
    }

    #[test]
    fn display_joins_with_arrow() {
        let p = Path::new(["$", ".count", "[0]"]);
        assert_eq!(p.to_string(), "$ → .count → [0]");
    }
}
