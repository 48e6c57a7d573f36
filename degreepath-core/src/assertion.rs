//! Assertion: a single clause applied to an aggregate over a matched
//! course set.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clause::{Clause, SingleClause};
use crate::course::{Clbid, CourseInstance};
use crate::error::SpecificationError;
use crate::path::Path;
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[serde(rename = "count(courses)")]
    Count,
    #[serde(rename = "count(distinct_courses)")]
    CountDistinct,
    #[serde(rename = "count(areas)")]
    CountAreas,
    #[serde(rename = "sum(credits)")]
    SumCredits,
    #[serde(rename = "average(grades)")]
    AverageGrade,
    #[serde(rename = "minimum(grades)")]
    MinimumGrade,
    #[serde(rename = "maximum(grades)")]
    MaximumGrade,
}

impl Aggregation {
    pub fn apply(self, items: &[&CourseInstance]) -> Value {
        match self {
            Aggregation::Count | Aggregation::CountAreas => Value::Integer(items.len() as i64),
            Aggregation::CountDistinct => {
                let mut codes: Vec<String> = items.iter().map(|c| c.course()).collect();
                codes.sort();
                codes.dedup();
                Value::Integer(codes.len() as i64)
            }
            Aggregation::SumCredits => {
                let total: Decimal = items.iter().map(|c| c.credits).sum();
                Value::Decimal(total)
            }
            Aggregation::AverageGrade => {
                if items.is_empty() {
                    Value::Decimal(Decimal::ZERO)
                } else {
                    let total: Decimal = items.iter().map(|c| c.grade_points()).sum();
                    Value::Decimal(total / Decimal::from(items.len() as i64))
                }
            }
            Aggregation::MinimumGrade => items
                .iter()
                .filter_map(|c| c.grade)
                .min()
                .map(Value::Grade)
                .unwrap_or(Value::Null),
            Aggregation::MaximumGrade => items
                .iter()
                .filter_map(|c| c.grade)
                .max()
                .map(Value::Grade)
                .unwrap_or(Value::Null),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Assertion {
    pub aggregation: Aggregation,
    #[serde(default)]
    pub where_clause: Option<Clause>,
    pub clause: SingleClause,
    pub path: Path,
    #[serde(default)]
    pub message: Option<String>,
}

/// The outcome of evaluating one assertion against a matched item set:
/// the actual aggregate, the expected value, the pass/fail verdict, the
/// rank, and any clbids an insertion exception added.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundAssertion {
    pub actual: Value,
    pub expected: Value,
    pub ok: bool,
    pub rank: f64,
    pub inserted: Vec<Clbid>,
    pub path: Path,
    pub message: Option<String>,
    pub overridden: bool,
}

impl Assertion {
    /// `compare_and_resolve_with`: filter by `where`, aggregate, evaluate.
    pub fn compare_and_resolve_with(
        &self,
        items: &[&CourseInstance],
        inserted: Vec<&CourseInstance>,
    ) -> Result<BoundAssertion, SpecificationError> {
        let mut filtered: Vec<&CourseInstance> = match &self.where_clause {
            None => items.to_vec(),
            Some(clause) => {
                let mut out = Vec::new();
                for item in items {
                    if clause.matches(&self.path, *item)? {
                        out.push(*item);
                    }
                }
                out
            }
        };
        let inserted_clbids: Vec<Clbid> = inserted.iter().map(|c| c.clbid.clone()).collect();
        filtered.extend(inserted.iter().copied());

        let actual = self.aggregation.apply(&filtered);
        let ok = self.clause.evaluate(&self.path, &actual)?;
        let rank = self.clause.rank(&actual, ok);

        Ok(BoundAssertion {
            actual,
            expected: self.clause.expected.clone(),
            ok,
            rank,
            inserted: inserted_clbids,
            path: self.path.clone(),
            message: self.message.clone(),
            overridden: false,
        })
    }
}

impl BoundAssertion {
    pub fn overridden(path: Path, message: Option<String>) -> Self {
        BoundAssertion {
            actual: Value::Null,
            expected: Value::Null,
            ok: true,
            rank: 1.0,
            inserted: Vec::new(),
            path,
            message,
            overridden: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Operator;
    use crate::course::CourseCode;
    use crate::grade::{Grade, GradeOption};

    fn course(clbid: &str, credits: i64) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse("CSCI 111").unwrap(),
            shorthand: None,
            credits: Decimal::from(credits),
            grade: Some(Grade::A),
            grade_option: GradeOption::Graded,
            is_in_progress: false,
            attempted: true,
            earned: true,
            term: 20091,
            gereqs: vec![],
            attributes: vec![],
            source: None,
        }
    }

    #[test]
    fn sum_credits_assertion() {
        let assertion = Assertion {
            aggregation: Aggregation::SumCredits,
            where_clause: None,
            clause: SingleClause {
                key: crate::clause::Key::SumCredits,
                operator: Operator::GreaterThanOrEqualTo,
                expected: Value::Integer(2),
            },
            path: Path::root(),
            message: None,
        };
        let a = course("1", 1);
        let b = course("2", 2);
        let bound = assertion.compare_and_resolve_with(&[&a, &b], vec![]).unwrap();
        assert!(bound.ok);
        assert_eq!(bound.actual, Value::Decimal(Decimal::from(3)));
    }

    #[test]
    fn under_satisfied_assertion_has_partial_rank() {
        let assertion = Assertion {
            aggregation: Aggregation::Count,
            where_clause: None,
            clause: SingleClause {
                key: crate::clause::Key::Count,
                operator: Operator::GreaterThanOrEqualTo,
                expected: Value::Integer(4),
            },
            path: Path::root(),
            message: None,
        };
        let a = course("1", 1);
        let bound = assertion.compare_and_resolve_with(&[&a], vec![]).unwrap();
        assert!(!bound.ok);
        assert!(bound.rank > 0.0 && bound.rank < 1.0);
    }
}
