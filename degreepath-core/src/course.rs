//! Course instances and the transcript they form, plus the course matcher.
//! Course instances are immutable once created; the transcript is an
//! ordered sequence with stable clbids.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::clause::{Clausable, Key};
use crate::grade::{Grade, GradeOption};
use crate::value::Value;

pub type Clbid = String;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CourseCode {
    pub subject: String,
    pub number: String,
}

impl CourseCode {
    pub fn parse(code: &str) -> Option<CourseCode> {
        let mut parts = code.splitn(2, ' ');
        let subject = parts.next()?.to_string();
        let number = parts.next()?.to_string();
        Some(CourseCode { subject, number })
    }
}

impl std::fmt::Display for CourseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.subject, self.number)
    }
}

/// Course codes are carried on the wire as a single `"SUBJ 123"` string,
/// the form every transcript and area specification actually uses,
/// rather than as a two-field object.
impl Serialize for CourseCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct CourseCodeVisitor;

impl<'de> Visitor<'de> for CourseCodeVisitor {
    type Value = CourseCode;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a course code such as \"CSCI 251\"")
    }

    fn visit_str<E>(self, v: &str) -> Result<CourseCode, E>
    where
        E: de::Error,
    {
        CourseCode::parse(v).ok_or_else(|| de::Error::custom(format!("invalid course code {:?}", v)))
    }
}

impl<'de> Deserialize<'de> for CourseCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(CourseCodeVisitor)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseSource {
    Institution,
    Ap,
    Ib,
    Transfer,
}

/// A single transcript entry. Frozen once constructed; the loader
/// (external to this crate) is responsible for dropping malformed records
/// before they reach the core.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CourseInstance {
    pub clbid: Clbid,
    pub code: CourseCode,
    pub shorthand: Option<String>,
    pub credits: Decimal,
    pub grade: Option<Grade>,
    pub grade_option: GradeOption,
    pub is_in_progress: bool,
    pub attempted: bool,
    pub earned: bool,
    pub term: i64,
    #[serde(default)]
    pub gereqs: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    pub source: Option<CourseSource>,
}

impl CourseInstance {
    pub fn course(&self) -> String {
        self.code.to_string()
    }

    pub fn grade_points(&self) -> Decimal {
        self.grade.map(|g| g.points()).unwrap_or(Decimal::ZERO)
    }
}

impl Clausable for CourseInstance {
    fn attr(&self, key: &Key) -> Value {
        match key {
            Key::Clbid => Value::String(self.clbid.clone()),
            Key::Code => Value::String(self.course()),
            Key::Subject => Value::String(self.code.subject.clone()),
            Key::Number => Value::String(self.code.number.clone()),
            Key::Credits => Value::Decimal(self.credits),
            Key::Grade => self.grade.map(Value::Grade).unwrap_or(Value::Null),
            Key::GradeOption => Value::String(
                match self.grade_option {
                    GradeOption::Graded => "graded",
                    GradeOption::SU => "s/u",
                }
                .to_string(),
            ),
            Key::Term => Value::Integer(self.term),
            Key::Status => Value::String(if self.is_in_progress { "in-progress" } else { "completed" }.to_string()),
            Key::IsInProgress => Value::Bool(self.is_in_progress),
            Key::GenEd(_) => Value::Strings(self.gereqs.clone()),
            Key::Attribute(name) => {
                if self.attributes.iter().any(|a| a == name) {
                    Value::Bool(true)
                } else {
                    Value::Strings(self.attributes.clone())
                }
            }
            _ => Value::Null,
        }
    }
}

/// How retaken courses are deduplicated before filtering.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    All,
    First,
    Last,
}

/// An ordered, indexed transcript. Course codes map to every instance on
/// the transcript with that code, in transcript order, so the course
/// matcher can enumerate candidates without a linear scan.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    courses: Vec<CourseInstance>,
    by_code: HashMap<String, Vec<usize>>,
}

impl Serialize for Transcript {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.courses.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let courses = Vec::<CourseInstance>::deserialize(deserializer)?;
        Ok(Transcript::new(courses))
    }
}

impl Transcript {
    pub fn new(courses: Vec<CourseInstance>) -> Self {
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, c) in courses.iter().enumerate() {
            by_code.entry(c.course()).or_default().push(i);
        }
        Transcript { courses, by_code }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseInstance> {
        self.courses.iter()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn find_by_clbid(&self, clbid: &str) -> Option<&CourseInstance> {
        self.courses.iter().find(|c| c.clbid == clbid)
    }

    /// Enumerates transcript matches for a course code, applying the
    /// `repeats` dedup policy first.
    pub fn find_all(&self, code: &str, repeats: RepeatMode) -> Vec<&CourseInstance> {
        let indices = match self.by_code.get(code) {
            Some(v) => v,
            None => return Vec::new(),
        };
        let mut matches: Vec<&CourseInstance> = indices.iter().map(|&i| &self.courses[i]).collect();

        match repeats {
            RepeatMode::All => matches,
            RepeatMode::First => {
                if let Some(best) = matches.iter().min_by_key(|c| c.term) {
                    matches = vec![*best];
                }
                matches
            }
            RepeatMode::Last => {
                if let Some(best) = matches.iter().max_by_key(|c| c.term) {
                    matches = vec![*best];
                }
                matches
            }
        }
    }

    pub fn find_ap_ib(&self, name: &str) -> Option<&CourseInstance> {
        self.courses.iter().find(|c| {
            matches!(c.source, Some(CourseSource::Ap) | Some(CourseSource::Ib))
                && (c.shorthand.as_deref() == Some(name) || c.course() == name)
        })
    }

    /// Applies a `repeats` policy across the whole transcript, the
    /// resolution `From`'s `student.courses` source uses before `where`
    /// filtering.
    pub fn deduplicated(&self, repeats: RepeatMode) -> Vec<&CourseInstance> {
        if repeats == RepeatMode::All {
            return self.courses.iter().collect();
        }
        let mut seen: HashMap<String, &CourseInstance> = HashMap::new();
        for c in &self.courses {
            let key = c.course();
            match seen.get(&key) {
                None => {
                    seen.insert(key, c);
                }
                Some(existing) => {
                    let replace = match repeats {
                        RepeatMode::First => c.term < existing.term,
                        RepeatMode::Last => c.term > existing.term,
                        RepeatMode::All => false,
                    };
                    if replace {
                        seen.insert(key, c);
                    }
                }
            }
        }
        let mut out: Vec<&CourseInstance> = seen.into_values().collect();
        out.sort_by_key(|c| c.clbid.clone());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(clbid: &str, code: &str, term: i64) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse(code).unwrap(),
            shorthand: None,
            credits: Decimal::ONE,
            grade: Some(Grade::A),
            grade_option: GradeOption::Graded,
            is_in_progress: false,
            attempted: true,
            earned: true,
            term,
            gereqs: vec![],
            attributes: vec![],
            source: None,
        }
    }

    #[test]
    fn repeat_first_keeps_earliest() {
        let t = Transcript::new(vec![
            course("1", "CSCI 111", 20091),
            course("2", "CSCI 111", 20081),
        ]);
        let matches = t.find_all("CSCI 111", RepeatMode::First);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].clbid, "2");
    }

    #[test]
    fn repeat_all_keeps_everything() {
        let t = Transcript::new(vec![
            course("1", "CSCI 111", 20091),
            course("2", "CSCI 111", 20081),
        ]);
        assert_eq!(t.find_all("CSCI 111", RepeatMode::All).len(), 2);
    }
}
