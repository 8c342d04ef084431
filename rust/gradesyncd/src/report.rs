use crate::model::StudentRecord;
use crate::status::GradeStatus;
use chrono::NaiveDate;
use serde::Serialize;

pub const CSV_HEADER: &str = "ID,Nombre,Estado,Fecha Visto,Nota Final,Feedback";

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// Feedback is free text from students, so it is always quoted.
fn feedback_field(feedback: Option<&str>) -> String {
    match feedback {
        Some(fb) if !fb.is_empty() => format!("\"{}\"", fb.replace('"', "\"\"")),
        _ => String::new(),
    }
}

/// One row per record, in store order. No trailing newline.
pub fn export_csv(records: &[StudentRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for r in records {
        lines.push(format!(
            "{},{},{},{},{},{}",
            csv_quote(&r.id),
            csv_quote(&r.name),
            r.status.as_str(),
            csv_quote(r.last_viewed.as_deref().unwrap_or("N/A")),
            csv_quote(&r.grades.final_cut.to_string()),
            feedback_field(r.feedback.as_deref())
        ));
    }
    lines.join("\n")
}

pub fn report_file_name(date: NaiveDate) -> String {
    format!("reporte_notas_{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    /// Every record past PENDING, answered or not.
    pub viewed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl BatchStats {
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let mut stats = BatchStats {
            total: records.len(),
            ..BatchStats::default()
        };
        for r in records {
            match r.status {
                GradeStatus::Pending => stats.pending += 1,
                GradeStatus::Viewed => stats.viewed += 1,
                GradeStatus::Accepted => {
                    stats.viewed += 1;
                    stats.accepted += 1;
                }
                GradeStatus::Rejected => {
                    stats.viewed += 1;
                    stats.rejected += 1;
                }
            }
        }
        stats
    }
}
