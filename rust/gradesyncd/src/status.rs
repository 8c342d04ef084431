use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle of one student's grade record.
///
/// `PENDING -> VIEWED -> {ACCEPTED | REJECTED}`. Nothing ever moves a record
/// back to an earlier state, and the two responses are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GradeStatus {
    #[default]
    Pending,
    Viewed,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEvent {
    /// A lookup matched the record.
    Viewed,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot apply `{event}` to a record that is {from}")]
    Disallowed {
        from: GradeStatus,
        event: StatusEvent,
    },
    #[error("no event moves a record to {0}")]
    Unreachable(GradeStatus),
}

impl GradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GradeStatus::Pending => "PENDING",
            GradeStatus::Viewed => "VIEWED",
            GradeStatus::Accepted => "ACCEPTED",
            GradeStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GradeStatus::Accepted | GradeStatus::Rejected)
    }

    /// Accept/reject are only offered while the record has been viewed and
    /// not yet answered.
    pub fn can_respond(self) -> bool {
        self == GradeStatus::Viewed
    }

    pub fn apply(self, event: StatusEvent) -> Result<GradeStatus, TransitionError> {
        use GradeStatus::*;
        match (self, event) {
            (Pending, StatusEvent::Viewed) | (Viewed, StatusEvent::Viewed) => Ok(Viewed),
            (Viewed, StatusEvent::Accepted) => Ok(Accepted),
            (Viewed, StatusEvent::Rejected) => Ok(Rejected),
            (from, event) => Err(TransitionError::Disallowed { from, event }),
        }
    }
}

impl StatusEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusEvent::Viewed => "view",
            StatusEvent::Accepted => "accept",
            StatusEvent::Rejected => "reject",
        }
    }

    /// The event whose successful application lands on `target`.
    pub fn toward(target: GradeStatus) -> Result<StatusEvent, TransitionError> {
        match target {
            GradeStatus::Viewed => Ok(StatusEvent::Viewed),
            GradeStatus::Accepted => Ok(StatusEvent::Accepted),
            GradeStatus::Rejected => Ok(StatusEvent::Rejected),
            GradeStatus::Pending => Err(TransitionError::Unreachable(GradeStatus::Pending)),
        }
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
