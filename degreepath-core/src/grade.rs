//! Letter grades, ordered by grade-point value rather than by letter, and
//! the graded/pass-fail grade option.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Grade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
    /// Satisfactory, in a pass/fail course.
    S,
    /// Unsatisfactory, in a pass/fail course.
    U,
    /// Credit, equivalent to S for point-value purposes.
    Cr,
    /// No credit, equivalent to U for point-value purposes.
    N,
}

impl Grade {
    /// The grade-point value on the conventional 4.0 scale. Pass/fail
    /// grades don't carry GPA weight; `S`/`Cr` compare as passing (above
    /// `F`) without implying a specific numeric grade.
    pub fn points(self) -> Decimal {
        match self {
            Grade::APlus => dec!(4.0),
            Grade::A => dec!(4.0),
            Grade::AMinus => dec!(3.7),
            Grade::BPlus => dec!(3.3),
            Grade::B => dec!(3.0),
            Grade::BMinus => dec!(2.7),
            Grade::CPlus => dec!(2.3),
            Grade::C => dec!(2.0),
            Grade::CMinus => dec!(1.7),
            Grade::DPlus => dec!(1.3),
            Grade::D => dec!(1.0),
            Grade::DMinus => dec!(0.7),
            Grade::F => dec!(0.0),
            Grade::S | Grade::Cr => dec!(4.0),
            Grade::U | Grade::N => dec!(0.0),
        }
    }

    pub fn is_passing(self) -> bool {
        !matches!(self, Grade::F | Grade::U | Grade::N)
    }

    pub fn letter(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::DMinus => "D-",
            Grade::F => "F",
            Grade::S => "S",
            Grade::U => "U",
            Grade::Cr => "CR",
            Grade::N => "N",
        }
    }
}

impl PartialOrd for Grade {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Grade {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.points().cmp(&other.points())
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGradeError(pub String);

impl fmt::Display for ParseGradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized grade {:?}", self.0)
    }
}

impl std::error::Error for ParseGradeError {}

impl FromStr for Grade {
    type Err = ParseGradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "A+" => Grade::APlus,
            "A" => Grade::A,
            "A-" => Grade::AMinus,
            "B+" => Grade::BPlus,
            "B" => Grade::B,
            "B-" => Grade::BMinus,
            "C+" => Grade::CPlus,
            "C" => Grade::C,
            "C-" => Grade::CMinus,
            "D+" => Grade::DPlus,
            "D" => Grade::D,
            "D-" => Grade::DMinus,
            "F" => Grade::F,
            "S" => Grade::S,
            "U" => Grade::U,
            "CR" | "Cr" => Grade::Cr,
            "N" => Grade::N,
            other => return Err(ParseGradeError(other.to_string())),
        })
    }
}

/// Grades are carried on the wire as their letter (`"A-"`, `"CR"`, ...),
/// not as the Rust variant name, since that's the form area specs and
/// transcripts actually use.
impl Serialize for Grade {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.letter())
    }
}

struct GradeVisitor;

impl<'de> Visitor<'de> for GradeVisitor {
    type Value = Grade;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a letter grade such as \"A-\" or \"CR\"")
    }

    fn visit_str<E>(self, v: &str) -> Result<Grade, E>
    where
        E: de::Error,
    {
        Grade::from_str(v).map_err(|_| de::Error::custom(format!("unrecognized grade {:?}", v)))
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(GradeVisitor)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeOption {
    Graded,
    #[serde(rename = "s/u")]
    SU,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_minus_fails_c_but_passes_d() {
        assert!(Grade::CMinus < Grade::C);
        assert!(Grade::CMinus >= Grade::D);
    }

    #[test]
    fn ordering_is_by_points_not_letter() {
        let mut grades = vec![Grade::BMinus, Grade::APlus, Grade::F, Grade::C];
        grades.sort();
        assert_eq!(grades, vec![Grade::F, Grade::C, Grade::BMinus, Grade::APlus]);
    }

    #[test]
    fn roundtrip_letters() {
        for g in [Grade::APlus, Grade::CMinus, Grade::F, Grade::S] {
            assert_eq!(Grade::from_str(g.letter()).unwrap(), g);
        }
    }
}
