use crate::status::GradeStatus;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One grade cell. Uploads store numbers, but records written by older
/// front ends can carry strings such as `"4,5"` or `"-"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GradeValue {
    Number(f64),
    Text(String),
}

impl Default for GradeValue {
    fn default() -> Self {
        GradeValue::Number(0.0)
    }
}

impl From<f64> for GradeValue {
    fn from(v: f64) -> Self {
        GradeValue::Number(v)
    }
}

impl GradeValue {
    /// Numeric view used for every comparison. Blank, `-` and unparseable
    /// text count as 0, the same rule the extraction prompt applies.
    pub fn as_number(&self) -> f64 {
        match self {
            GradeValue::Number(n) if n.is_finite() => *n,
            GradeValue::Number(_) => 0.0,
            GradeValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() || t == "-" {
                    return 0.0;
                }
                t.replace(',', ".")
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .unwrap_or(0.0)
            }
        }
    }
}

impl fmt::Display for GradeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeValue::Number(n) => write!(f, "{}", n),
            GradeValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeDetail {
    pub advances: GradeValue,
    pub replica: GradeValue,
    pub report: GradeValue,
    pub final15: GradeValue,
    pub final20: GradeValue,
    pub final_cut: GradeValue,
}

impl GradeDetail {
    pub fn final_grade(&self) -> f64 {
        self.final_cut.as_number()
    }

    pub fn is_passing(&self, threshold: f64) -> bool {
        self.final_grade() >= threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub grades: GradeDetail,
    #[serde(default)]
    pub status: GradeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed: Option<String>,
}

/// A row as returned by the extraction model. All seven fields are
/// required; the model is asked to coerce blanks to 0 itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRow {
    pub name: String,
    pub advances: f64,
    pub replica: f64,
    pub report: f64,
    pub final15: f64,
    pub final20: f64,
    pub final_cut: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedGrades {
    pub students: Vec<ExtractedRow>,
}

impl ExtractedRow {
    pub fn grades(&self) -> GradeDetail {
        GradeDetail {
            advances: self.advances.into(),
            replica: self.replica.into(),
            report: self.report.into(),
            final15: self.final15.into(),
            final20: self.final20.into(),
            final_cut: self.final_cut.into(),
        }
    }

    pub fn numbers(&self) -> [(&'static str, f64); 6] {
        [
            ("advances", self.advances),
            ("replica", self.replica),
            ("report", self.report),
            ("final15", self.final15),
            ("final20", self.final20),
            ("finalCut", self.final_cut),
        ]
    }
}

/// ISO-8601 UTC with millisecond precision, the shape `lastViewed` has
/// always been stored in.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
