//! The degreepath audit engine core: a tree interpreter that decides
//! whether some assignment of a student's transcript to an area
//! specification's rule tree satisfies every rule, and if not, returns
//! the closest failing assignment with a structured account of why.
//!
//! This crate is the "rule/solution/result engine" only. Loading area
//! specifications and transcripts from YAML/JSON, the command-line front
//! end, output formatting, and report persistence are external
//! collaborators — see the sibling `degreepath-cli` crate.

pub mod area;
pub mod area_pointer;
pub mod assertion;
pub mod claim;
pub mod clause;
pub mod context;
pub mod course;
pub mod error;
pub mod exception;
pub mod grade;
pub mod limit;
pub mod path;
pub mod rule;
pub mod solver;
pub mod value;

pub use area::{AreaResult, AreaSpec};
pub use area_pointer::{AreaKind, AreaPointer, AreaStatus};
pub use claim::{ClaimOutcome, ClaimRegistry, MulticountableTable};
pub use context::RequirementContext;
pub use course::{Clbid, CourseCode, CourseInstance, RepeatMode, Transcript};
pub use error::{DataError, SpecificationError};
pub use exception::{Exception, ExceptionKind, ExceptionSet};
pub use grade::{Grade, GradeOption};
pub use path::Path;
pub use rule::{ResultDetail, ResultNode, Rule, Solution};
pub use solver::solve;
pub use value::Value;
