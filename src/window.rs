use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MissingDeadlineError;
use crate::models::{DeadlineType, DueDate};

/// The half-open span `[start, end)` in which a round's submission counts as on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundWindow {
    pub round: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RoundWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Open interval test; an instant on either boundary is outside.
    pub fn strictly_inside(&self, at: DateTime<Utc>) -> bool {
        self.start < at && at < self.end
    }
}

/// First recorded submission deadline for `round`, in caller order.
pub fn submission_due_at(
    round: u32,
    due_dates: &[DueDate],
) -> Result<DateTime<Utc>, MissingDeadlineError> {
    due_dates
        .iter()
        .find(|due| due.round == round && due.deadline_type == DeadlineType::Submission)
        .map(|due| due.due_at)
        .ok_or(MissingDeadlineError {
            round,
            deadline_type: DeadlineType::Submission,
        })
}

pub fn resolve_window(
    round: u32,
    due_dates: &[DueDate],
    assignment_created_at: DateTime<Utc>,
) -> Result<RoundWindow, MissingDeadlineError> {
    let end = submission_due_at(round, due_dates)?;
    let start = if round > 1 {
        submission_due_at(round - 1, due_dates)?
    } else {
        assignment_created_at
    };

    Ok(RoundWindow { round, start, end })
}

pub fn resolve_windows(
    round_count: u32,
    due_dates: &[DueDate],
    assignment_created_at: DateTime<Utc>,
) -> Vec<Result<RoundWindow, MissingDeadlineError>> {
    (1..=round_count)
        .map(|round| resolve_window(round, due_dates, assignment_created_at))
        .collect()
}
