//! Error families. Specification errors are fatal and abort the whole
//! audit; data errors are fatal for the (small) surface the core itself
//! validates (exception paths); audit verdicts are never errors — they
//! travel back as a plain `Result` tree, not a `Result<_, E>`.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

use crate::path::Path;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecificationError {
    #[error("unknown key {key:?} at {path}")]
    UnknownKey { path: Path, key: String },

    #[error("count {count} out of range at {path}: must be between 0 and {max}")]
    CountOutOfRange { path: Path, count: i64, max: usize },

    #[error("unresolved reference {name:?} at {path}")]
    UnresolvedReference { path: Path, name: String },

    #[error("forward reference to {name:?} at {path}: requirements must be defined before they are referenced")]
    ForwardReference { path: Path, name: String },

    #[error("unknown operator {op:?} at {path}")]
    UnknownOperator { path: Path, op: String },

    #[error("unknown aggregation function {name:?} at {path}")]
    UnknownAggregation { path: Path, name: String },

    #[error("cycle in requirement references: {}", cycle.join(" -> "))]
    ReferenceCycle { cycle: Vec<String> },

    #[error("duplicate path {path} used by more than one rule node")]
    DuplicatePath { path: Path },

    #[error("operator {op:?} cannot be applied between two sequences at {path}")]
    SequenceSequenceMismatch { path: Path, op: String },

    #[error("operator {op:?} requires at least one side to be a sequence at {path}")]
    ScalarScalarSetOperator { path: Path, op: String },

    #[error("both rule at {path} must name exactly two children; found {found}")]
    BothWrongArity { path: Path, found: usize },

    #[error("unused requirement {name:?} declared but never referenced from the result rule")]
    UnusedRequirement { name: String },

    #[error("requirement {name:?} at {path} has neither a child rule nor audited_by: exactly one is required")]
    IncompleteRequirement { path: Path, name: String },
}

impl SpecificationError {
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        let diag = Diagnostic::error().with_message(self.to_string());
        match self {
            SpecificationError::UnknownKey { path, .. }
            | SpecificationError::CountOutOfRange { path, .. }
            | SpecificationError::UnresolvedReference { path, .. }
            | SpecificationError::ForwardReference { path, .. }
            | SpecificationError::UnknownOperator { path, .. }
            | SpecificationError::UnknownAggregation { path, .. }
            | SpecificationError::DuplicatePath { path }
            | SpecificationError::SequenceSequenceMismatch { path, .. }
            | SpecificationError::ScalarScalarSetOperator { path, .. }
            | SpecificationError::BothWrongArity { path, .. }
            | SpecificationError::IncompleteRequirement { path, .. } => {
                diag.with_notes(vec![format!("at path {}", path)])
            }
            SpecificationError::ReferenceCycle { cycle } => {
                diag.with_notes(vec![format!("cycle: {}", cycle.join(" -> "))])
            }
            SpecificationError::UnusedRequirement { name } => {
                diag.with_notes(vec![format!("requirement {:?} is never referenced", name)])
            }
        }
    }

    #[allow(dead_code)]
    fn label_free(&self) -> Vec<Label<()>> {
        Vec::new()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("exception path {path} does not refer to any rule node in this area")]
    InvalidExceptionPath { path: Path },

    #[error("insertion exception at {path} names clbid {clbid:?} which is not present on the transcript")]
    UnknownInsertedClbid { path: Path, clbid: String },
}
