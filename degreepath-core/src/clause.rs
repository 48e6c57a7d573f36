//! The clause language: single clauses compare one attribute with one
//! operator against one expected value; compound clauses combine
//! clauses with `and`/`or`, short-circuiting.

use serde::{Deserialize, Serialize};

use crate::error::SpecificationError;
use crate::path::Path;
use crate::value::Value;

/// Anything a clause can be evaluated against: a course instance, an area
/// pointer, or (for assertions) a bound aggregate value.
pub trait Clausable {
    fn attr(&self, key: &Key) -> Value;
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Clbid,
    Code,
    Subject,
    Number,
    Credits,
    Grade,
    GradeOption,
    Term,
    Status,
    IsInProgress,
    #[serde(rename = "gereqs")]
    GenEd(String),
    Attribute(String),

    AreaCode,
    AreaKind,
    AreaStatus,
    AreaDegree,
    AreaDepartment,
    AreaGpa,

    Count,
    DistinctCount,
    SumCredits,
    AverageGrade,
    MinGrade,
    MaxGrade,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    #[serde(rename = "$lt")]
    LessThan,
    #[serde(rename = "$lte")]
    LessThanOrEqualTo,
    #[serde(rename = "$gt")]
    GreaterThan,
    #[serde(rename = "$gte")]
    GreaterThanOrEqualTo,
    #[serde(rename = "$eq")]
    EqualTo,
    #[serde(rename = "$neq")]
    NotEqualTo,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    NotIn,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::LessThan => "<",
            Operator::LessThanOrEqualTo => "\u{2264}",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqualTo => "\u{2265}",
            Operator::EqualTo => "=",
            Operator::NotEqualTo => "\u{2260}",
            Operator::In => "\u{2208}",
            Operator::NotIn => "\u{2209}",
        }
    }

    fn is_set_op(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Applies `op` between a value drawn from the data (`lhs`) and a value
/// drawn from the area specification (`rhs`), applying the same type
/// coercions the area-specification language relies on.
pub fn apply_operator(
    path: &Path,
    op: Operator,
    lhs: &Value,
    rhs: &Value,
) -> Result<bool, SpecificationError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(false);
    }

    if let (Value::Grade(a), Value::Grade(b)) = (lhs, rhs) {
        return Ok(compare_ordered(op, a, b));
    }

    match (lhs, rhs) {
        (Value::Strings(a), Value::Strings(b)) => {
            if op != Operator::In {
                return Err(SpecificationError::SequenceSequenceMismatch {
                    path: path.clone(),
                    op: format!("{:?}", op),
                });
            }
            if a.is_empty() || b.is_empty() {
                return Ok(false);
            }
            let a: std::collections::HashSet<&String> = a.iter().collect();
            Ok(b.iter().any(|v| a.contains(v)))
        }
        _ if lhs.is_sequence() || rhs.is_sequence() => {
            apply_sequence_scalar(path, op, lhs, rhs)
        }
        _ => apply_scalar(path, op, lhs, rhs),
    }
}

fn apply_sequence_scalar(
    path: &Path,
    op: Operator,
    lhs: &Value,
    rhs: &Value,
) -> Result<bool, SpecificationError> {
    match op {
        Operator::EqualTo => {
            if let Value::Strings(l) = lhs {
                if l.len() == 1 {
                    return apply_operator(path, Operator::EqualTo, &string_value(&l[0]), rhs);
                }
                if l.is_empty() {
                    return Ok(false);
                }
            }
            if let Value::Strings(r) = rhs {
                if r.len() == 1 {
                    return apply_operator(path, Operator::EqualTo, lhs, &string_value(&r[0]));
                }
                if r.is_empty() {
                    return Ok(false);
                }
            }
            apply_operator(path, Operator::In, lhs, rhs)
        }
        Operator::NotEqualTo => apply_operator(path, Operator::NotIn, lhs, rhs),
        Operator::In => {
            if let Value::Strings(l) = lhs {
                return Ok(l
                    .iter()
                    .any(|v| matches!(apply_operator(path, Operator::EqualTo, &string_value(v), rhs), Ok(true))));
            }
            if let Value::Strings(r) = rhs {
                return Ok(r
                    .iter()
                    .any(|v| matches!(apply_operator(path, Operator::EqualTo, lhs, &string_value(v)), Ok(true))));
            }
            Err(SpecificationError::ScalarScalarSetOperator {
                path: path.clone(),
                op: format!("{:?}", op),
            })
        }
        Operator::NotIn => {
            if let Value::Strings(l) = lhs {
                return Ok(l
                    .iter()
                    .all(|v| matches!(apply_operator(path, Operator::NotEqualTo, &string_value(v), rhs), Ok(true))));
            }
            if let Value::Strings(r) = rhs {
                return Ok(r
                    .iter()
                    .all(|v| matches!(apply_operator(path, Operator::NotEqualTo, lhs, &string_value(v)), Ok(true))));
            }
            Err(SpecificationError::ScalarScalarSetOperator {
                path: path.clone(),
                op: format!("{:?}", op),
            })
        }
        _ => Err(SpecificationError::SequenceSequenceMismatch {
            path: path.clone(),
            op: format!("{:?}", op),
        }),
    }
}

fn string_value(s: &str) -> Value {
    Value::String(s.to_string())
}

fn apply_scalar(path: &Path, op: Operator, lhs: &Value, rhs: &Value) -> Result<bool, SpecificationError> {
    if op.is_set_op() {
        return Err(SpecificationError::ScalarScalarSetOperator {
            path: path.clone(),
            op: format!("{:?}", op),
        });
    }

    if let (Some(a), Some(b)) = (lhs.as_decimal(), rhs.as_decimal()) {
        return Ok(match op {
            Operator::LessThan => a < b,
            Operator::LessThanOrEqualTo => a <= b,
            Operator::GreaterThan => a > b,
            Operator::GreaterThanOrEqualTo => a >= b,
            Operator::EqualTo => a == b,
            Operator::NotEqualTo => a != b,
            Operator::In | Operator::NotIn => unreachable!(),
        });
    }

    let (lhs, rhs): (String, String) = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => (a.clone(), b.clone()),
        (Value::String(a), b) => (a.clone(), b.stringify()),
        (a, Value::String(b)) => (a.stringify(), b.clone()),
        (a, b) => (a.stringify(), b.stringify()),
    };

    Ok(match op {
        Operator::LessThan => lhs < rhs,
        Operator::LessThanOrEqualTo => lhs <= rhs,
        Operator::GreaterThan => lhs > rhs,
        Operator::GreaterThanOrEqualTo => lhs >= rhs,
        Operator::EqualTo => lhs == rhs,
        Operator::NotEqualTo => lhs != rhs,
        Operator::In | Operator::NotIn => unreachable!(),
    })
}

fn compare_ordered<T: PartialOrd>(op: Operator, a: &T, b: &T) -> bool {
    match op {
        Operator::LessThan => a < b,
        Operator::LessThanOrEqualTo => a <= b,
        Operator::GreaterThan => a > b,
        Operator::GreaterThanOrEqualTo => a >= b,
        Operator::EqualTo => a == b,
        Operator::NotEqualTo => a != b,
        Operator::In | Operator::NotIn => false,
    }
}

/// A rank contribution: satisfied clauses contribute `1.0`; an unsatisfied
/// quantitative clause contributes `actual / required` clamped to `[0, 1)`,
/// giving monotonic, bounded partial credit.
pub fn rank_of(_op: Operator, ok: bool, actual: &Value, expected: &Value) -> f64 {
    if ok {
        return 1.0;
    }
    match (actual.as_decimal(), expected.as_decimal()) {
        (Some(a), Some(e)) if e != rust_decimal::Decimal::ZERO => {
            let ratio: f64 = (a / e).to_string().parse().unwrap_or(0.0);
            ratio.clamp(0.0, 0.9999)
        }
        _ => 0.0,
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SingleClause {
    pub key: Key,
    pub operator: Operator,
    pub expected: Value,
}

impl SingleClause {
    pub fn evaluate(&self, path: &Path, actual: &Value) -> Result<bool, SpecificationError> {
        apply_operator(path, self.operator, actual, &self.expected)
    }

    pub fn rank(&self, actual: &Value, ok: bool) -> f64 {
        rank_of(self.operator, ok, actual, &self.expected)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Clause {
    Single(SingleClause),
    Compound { op: BoolOp, children: Vec<Clause> },
}

impl Clause {
    pub fn matches(&self, path: &Path, item: &dyn Clausable) -> Result<bool, SpecificationError> {
        match self {
            Clause::Single(c) => {
                let actual = item.attr(&c.key);
                c.evaluate(path, &actual)
            }
            Clause::Compound { op, children } => match op {
                BoolOp::And => {
                    for child in children {
                        if !child.matches(path, item)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                BoolOp::Or => {
                    for child in children {
                        if child.matches(path, item)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::Grade;

    fn p() -> Path {
        Path::root()
    }

    #[test]
    fn grade_gte_c_uses_point_value() {
        let ok = apply_operator(
            &p(),
            Operator::GreaterThanOrEqualTo,
            &Value::Grade(Grade::CMinus),
            &Value::Grade(Grade::C),
        )
        .unwrap();
        assert!(!ok);

        let ok = apply_operator(
            &p(),
            Operator::GreaterThanOrEqualTo,
            &Value::Grade(Grade::CMinus),
            &Value::Grade(Grade::D),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn null_on_one_side_is_false() {
        assert!(!apply_operator(&p(), Operator::EqualTo, &Value::Null, &Value::Integer(1)).unwrap());
        assert!(!apply_operator(&p(), Operator::EqualTo, &Value::Null, &Value::Null).unwrap());
    }

    #[test]
    fn sequence_in_is_intersection_non_empty() {
        let a = Value::Strings(vec!["SPM".into(), "FYS".into()]);
        let b = Value::Strings(vec!["SPM".into()]);
        assert!(apply_operator(&p(), Operator::In, &a, &b).unwrap());

        let c = Value::Strings(vec!["WR".into()]);
        assert!(!apply_operator(&p(), Operator::In, &a, &c).unwrap());
    }

    #[test]
    fn sequence_sequence_with_other_op_errors() {
        let a = Value::Strings(vec!["SPM".into()]);
        let b = Value::Strings(vec!["SPM".into()]);
        assert!(apply_operator(&p(), Operator::NotIn, &a, &b).is_err());
    }

    #[test]
    fn one_element_sequence_eq_unwraps() {
        let a = Value::Strings(vec!["SPM".into()]);
        let b = Value::String("SPM".into());
        assert!(apply_operator(&p(), Operator::EqualTo, &a, &b).unwrap());
    }

    #[test]
    fn empty_sequence_eq_is_false() {
        let a = Value::Strings(vec![]);
        let b = Value::String("SPM".into());
        assert!(!apply_operator(&p(), Operator::EqualTo, &a, &b).unwrap());
    }

    #[test]
    fn string_coercion_when_one_side_not_string() {
        let a = Value::Integer(5);
        let b = Value::String("5".into());
        assert!(apply_operator(&p(), Operator::EqualTo, &a, &b).unwrap());
    }

    #[test]
    fn compound_and_short_circuits() {
        struct Dummy;
        impl Clausable for Dummy {
            fn attr(&self, _key: &Key) -> Value {
                Value::Integer(1)
            }
        }
        let clause = Clause::Compound {
            op: BoolOp::And,
            children: vec![
                Clause::Single(SingleClause {
                    key: Key::Credits,
                    operator: Operator::EqualTo,
                    expected: Value::Integer(1),
                }),
                Clause::Single(SingleClause {
                    key: Key::Credits,
                    operator: Operator::EqualTo,
                    expected: Value::Integer(2),
                }),
            ],
        };
        assert!(!clause.matches(&p(), &Dummy).unwrap());
    }
}
