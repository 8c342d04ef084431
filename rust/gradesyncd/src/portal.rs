//! Student-facing workflow: find my grades, then accept or dispute them.

use crate::access::{filter_for_lookup, find_by_name, FilterOutcome, NameMatchRule};
use crate::error::{GradeSyncError, GsResult};
use crate::extract::Encourager;
use crate::model::StudentRecord;
use crate::status::GradeStatus;
use crate::store::GradeStore;
use tracing::{debug, info, warn};

pub const FALLBACK_ENCOURAGEMENT: &str = "¡Buen trabajo!";

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found {
        record: StudentRecord,
        /// True when this lookup moved the record out of PENDING.
        first_view: bool,
    },
    NotFound,
    BatchInvalid,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Found { .. } => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::BatchInvalid => "batch_invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentResponse {
    Accept,
    Reject { reason: String },
}

/// Finds a student by name and records that they saw their grades.
///
/// A PENDING match becomes VIEWED. A VIEWED match is re-stamped only when
/// `restamp` is set; answered records are returned untouched.
pub fn lookup<S: GradeStore + ?Sized>(
    store: &mut S,
    batch_id: Option<&str>,
    query: &str,
    rule: NameMatchRule,
    restamp: bool,
) -> GsResult<LookupOutcome> {
    let records = store.load_all()?;
    let (candidates, outcome) = filter_for_lookup(&records, batch_id);
    if outcome == FilterOutcome::BatchInvalid {
        info!(batch_id = ?batch_id, "lookup against a batch that is no longer loaded");
        return Ok(LookupOutcome::BatchInvalid);
    }
    let Some(hit) = find_by_name(&candidates, query, rule) else {
        debug!(query = %query, "no student matched");
        return Ok(LookupOutcome::NotFound);
    };

    let first_view = hit.status == GradeStatus::Pending;
    let stamp = first_view || (restamp && !hit.status.is_terminal());
    if !stamp {
        return Ok(LookupOutcome::Found {
            record: hit.clone(),
            first_view,
        });
    }
    let id = hit.id.clone();
    let record = store
        .update_status(&id, GradeStatus::Viewed, None)?
        .ok_or_else(|| GradeSyncError::NotFound(id.clone()))?;
    info!(student_id = %id, first_view, "grades viewed");
    Ok(LookupOutcome::Found { record, first_view })
}

/// Records the student's answer. Only a VIEWED record can be answered and a
/// rejection needs a reason.
pub fn respond<S: GradeStore + ?Sized>(
    store: &mut S,
    student_id: &str,
    response: StudentResponse,
) -> GsResult<StudentRecord> {
    let (target, reason) = match &response {
        StudentResponse::Accept => (GradeStatus::Accepted, None),
        StudentResponse::Reject { reason } => {
            if reason.trim().is_empty() {
                return Err(GradeSyncError::BadParams(
                    "a rejection needs a reason".into(),
                ));
            }
            (GradeStatus::Rejected, Some(reason.as_str()))
        }
    };
    let record = store
        .update_status(student_id, target, reason)?
        .ok_or_else(|| GradeSyncError::NotFound(student_id.to_string()))?;
    info!(student_id = %student_id, status = %record.status, "student answered");
    Ok(record)
}

/// Never fails: any model error or empty reply yields the fixed fallback.
pub fn encouragement_or_fallback<E: Encourager + ?Sized>(
    encourager: &E,
    record: &StudentRecord,
    pass_threshold: f64,
) -> String {
    match encourager.encourage(&record.name, record.grades.final_grade(), pass_threshold) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!(student_id = %record.id, "empty encouragement reply; using fallback");
            FALLBACK_ENCOURAGEMENT.to_string()
        }
        Err(e) => {
            warn!(student_id = %record.id, error = %e, "encouragement unavailable; using fallback");
            FALLBACK_ENCOURAGEMENT.to_string()
        }
    }
}
