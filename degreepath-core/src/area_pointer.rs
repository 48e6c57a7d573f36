//! A declared area of study on the student's record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clause::{Clausable, Key};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaStatus {
    Declared,
    Completed,
    Planned,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Major,
    Concentration,
    Emphasis,
    Degree,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AreaPointer {
    pub code: String,
    pub status: AreaStatus,
    pub kind: AreaKind,
    pub name: String,
    pub degree: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub gpa: Option<Decimal>,
}

impl Clausable for AreaPointer {
    fn attr(&self, key: &Key) -> Value {
        match key {
            Key::AreaCode => Value::String(self.code.clone()),
            Key::AreaKind => Value::String(format!("{:?}", self.kind).to_lowercase()),
            Key::AreaStatus => Value::String(format!("{:?}", self.status).to_lowercase()),
            Key::AreaDegree => Value::String(self.degree.clone()),
            Key::AreaDepartment => self
                .department
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            Key::AreaGpa => self.gpa.map(Value::Decimal).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}
