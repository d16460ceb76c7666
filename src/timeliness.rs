use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ClassificationError;
use crate::freshness::{Freshness, FreshnessSource, Unavailable};
use crate::models::{DueDate, ResponseMap, SubmissionEvent, SubmissionOperation};
use crate::window::resolve_window;

/// Submission status for one round, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimelinessStatus {
    /// Something was submitted inside the round's window.
    OnTime,
    /// Nothing new was submitted, but an earlier hyperlink's target changed inside the window.
    LinkUpdated,
    /// An earlier hyperlink exists and its target was last changed outside the window.
    StaleLink,
    NoSubmission,
    Graded,
}

impl TimelinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelinessStatus::OnTime => "on-time",
            TimelinessStatus::LinkUpdated => "link-updated",
            TimelinessStatus::StaleLink => "stale-link",
            TimelinessStatus::NoSubmission => "no-submission",
            TimelinessStatus::Graded => "graded",
        }
    }
}

/// Read-only inputs for classifying one reviewee through one response map.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub reviewee_team_id: i64,
    pub round_count: u32,
    pub assignment_created_at: DateTime<Utc>,
    pub due_dates: &'a [DueDate],
    pub submissions: &'a [SubmissionEvent],
    pub response_map: &'a ResponseMap,
}

impl<'a> ClassificationInput<'a> {
    fn team_events(&self) -> impl Iterator<Item = &'a SubmissionEvent> + '_ {
        let team_id = self.reviewee_team_id;
        self.submissions
            .iter()
            .filter(move |event| event.team_id == team_id)
    }

    /// Most recent hyperlink submitted between assignment creation and `due_at`, both inclusive.
    fn latest_hyperlink(&self, due_at: DateTime<Utc>) -> Option<&'a str> {
        let created_at = self.assignment_created_at;
        self.team_events()
            .filter(|event| event.operation == SubmissionOperation::SubmitHyperlink)
            .filter(|event| !event.content.trim().is_empty())
            .filter(|event| event.created_at >= created_at && event.created_at <= due_at)
            .max_by_key(|event| event.created_at)
            .map(|event| event.content.trim())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundStatus {
    pub round: u32,
    pub outcome: Result<TimelinessStatus, ClassificationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub rounds: Vec<RoundStatus>,
}

impl Classification {
    /// Status of the last round; `None` when that round could not be classified.
    pub fn final_status(&self) -> Option<TimelinessStatus> {
        self.rounds
            .last()
            .and_then(|round| round.outcome.as_ref().ok().copied())
    }

    pub fn statuses(&self) -> Vec<Option<TimelinessStatus>> {
        self.rounds
            .iter()
            .map(|round| round.outcome.as_ref().ok().copied())
            .collect()
    }
}

pub async fn classify<S: FreshnessSource>(
    input: &ClassificationInput<'_>,
    freshness: &S,
) -> Classification {
    let rounds = 1..=input.round_count;

    if input.response_map.has_response() && input.response_map.has_final_grade() {
        return Classification {
            rounds: rounds
                .map(|round| RoundStatus {
                    round,
                    outcome: Ok(TimelinessStatus::Graded),
                })
                .collect(),
        };
    }

    // at most one outbound lookup per run
    let mut checked: Option<(String, Freshness)> = None;
    let mut statuses = Vec::with_capacity(input.round_count as usize);

    for round in rounds {
        let outcome = classify_round(input, round, freshness, &mut checked).await;
        if let Err(err) = &outcome {
            warn!(
                map_id = input.response_map.id,
                reviewee = input.reviewee_team_id,
                %err,
                "round left unclassified"
            );
        }
        statuses.push(RoundStatus { round, outcome });
    }

    Classification { rounds: statuses }
}

async fn classify_round<S: FreshnessSource>(
    input: &ClassificationInput<'_>,
    round: u32,
    freshness: &S,
    checked: &mut Option<(String, Freshness)>,
) -> Result<TimelinessStatus, ClassificationError> {
    let window = resolve_window(round, input.due_dates, input.assignment_created_at)
        .map_err(|source| ClassificationError::Window { round, source })?;

    let submitted_in_window = input
        .team_events()
        .any(|event| event.operation.is_submission() && window.contains(event.created_at));
    if submitted_in_window {
        return Ok(TimelinessStatus::OnTime);
    }

    let Some(link) = input.latest_hyperlink(window.end) else {
        return Ok(TimelinessStatus::NoSubmission);
    };

    let result = match checked {
        Some((url, result)) if url.as_str() == link => *result,
        Some(_) => Freshness::NotAvailable(Unavailable::CheckLimitReached),
        None => {
            let result = freshness.last_modified(link).await;
            *checked = Some((link.to_string(), result));
            result
        }
    };
    debug!(round, link, ?result, "hyperlink freshness");

    Ok(match result {
        Freshness::Modified(at) if window.strictly_inside(at) => TimelinessStatus::LinkUpdated,
        Freshness::Modified(_) => TimelinessStatus::StaleLink,
        Freshness::NotAvailable(_) => TimelinessStatus::NoSubmission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeadlineType, MapKind, Response};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TEAM: i64 = 42;
    const LINK: &str = "https://wiki.example.edu/Team_42";

    struct StubSource {
        answer: Freshness,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(answer: Freshness) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FreshnessSource for StubSource {
        async fn last_modified(&self, _url: &str) -> Freshness {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        created() + Duration::days(n)
    }

    fn due_dates() -> Vec<DueDate> {
        [(1, 7), (2, 14), (3, 21)]
            .into_iter()
            .map(|(round, days)| DueDate {
                parent_id: 1,
                round,
                deadline_type: DeadlineType::Submission,
                due_at: day(days),
            })
            .collect()
    }

    fn event(operation: SubmissionOperation, at: DateTime<Utc>) -> SubmissionEvent {
        let content = match operation {
            SubmissionOperation::SubmitHyperlink => LINK.to_string(),
            _ => "report.pdf".to_string(),
        };
        SubmissionEvent {
            team_id: TEAM,
            operation,
            content,
            created_at: at,
        }
    }

    fn map(rounds: &[u32], grade: Option<f64>) -> ResponseMap {
        ResponseMap {
            id: 9,
            reviewer_id: 3,
            reviewee_id: TEAM,
            reviewed_object_id: 1,
            kind: MapKind::Review,
            responses: rounds
                .iter()
                .map(|&round| Response {
                    round,
                    comments: Vec::new(),
                    score: None,
                })
                .collect(),
            reviewer_grade: grade,
        }
    }

    fn input<'a>(
        round_count: u32,
        due_dates: &'a [DueDate],
        submissions: &'a [SubmissionEvent],
        response_map: &'a ResponseMap,
    ) -> ClassificationInput<'a> {
        ClassificationInput {
            reviewee_team_id: TEAM,
            round_count,
            assignment_created_at: created(),
            due_dates,
            submissions,
            response_map,
        }
    }

    /// Never answers; records when its pending lookup is dropped.
    #[derive(Default)]
    struct HangingSource {
        dropped: AtomicBool,
    }

    struct DropFlag<'a>(&'a AtomicBool);

    impl Drop for DropFlag<'_> {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl FreshnessSource for HangingSource {
        async fn last_modified(&self, _url: &str) -> Freshness {
            let _flag = DropFlag(&self.dropped);
            std::future::pending().await
        }
    }

    fn unavailable() -> StubSource {
        StubSource::new(Freshness::NotAvailable(Unavailable::OutOfScope))
    }

    #[tokio::test]
    async fn graded_reviews_take_precedence() {
        let due = due_dates();
        let map = map(&[1], Some(95.0));
        let source = unavailable();
        let result = classify(&input(2, &due, &[], &map), &source).await;
        assert_eq!(
            result.statuses(),
            vec![Some(TimelinessStatus::Graded), Some(TimelinessStatus::Graded)]
        );
        assert_eq!(result.final_status(), Some(TimelinessStatus::Graded));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn grade_without_any_response_is_not_graded() {
        let due = due_dates();
        let map = map(&[], Some(95.0));
        let result = classify(&input(1, &due, &[], &map), &unavailable()).await;
        assert_eq!(result.final_status(), Some(TimelinessStatus::NoSubmission));
    }

    #[tokio::test]
    async fn submissions_inside_each_window_are_on_time() {
        let due = due_dates();
        let events = vec![
            event(SubmissionOperation::SubmitFile, day(3)),
            event(SubmissionOperation::SubmitHyperlink, day(10)),
        ];
        let map = map(&[1], None);
        let source = unavailable();
        let result = classify(&input(2, &due, &events, &map), &source).await;
        assert_eq!(
            result.statuses(),
            vec![Some(TimelinessStatus::OnTime), Some(TimelinessStatus::OnTime)]
        );
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn submission_at_window_end_belongs_to_next_round() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitFile, day(7))];
        let map = map(&[], None);
        let result = classify(&input(2, &due, &events, &map), &unavailable()).await;
        assert_eq!(
            result.statuses(),
            vec![
                Some(TimelinessStatus::NoSubmission),
                Some(TimelinessStatus::OnTime)
            ]
        );
    }

    #[tokio::test]
    async fn removals_and_other_teams_do_not_count() {
        let due = due_dates();
        let mut other_team = event(SubmissionOperation::SubmitFile, day(2));
        other_team.team_id = TEAM + 1;
        let events = vec![event(SubmissionOperation::RemoveFile, day(2)), other_team];
        let map = map(&[], None);
        let result = classify(&input(1, &due, &events, &map), &unavailable()).await;
        assert_eq!(result.final_status(), Some(TimelinessStatus::NoSubmission));
    }

    #[tokio::test]
    async fn link_updated_inside_window_counts_as_caught_up() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[1], None);
        let source = StubSource::new(Freshness::Modified(day(10)));
        let result = classify(&input(2, &due, &events, &map), &source).await;
        assert_eq!(
            result.statuses(),
            vec![
                Some(TimelinessStatus::OnTime),
                Some(TimelinessStatus::LinkUpdated)
            ]
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn link_modified_exactly_at_previous_deadline_is_stale() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[], None);
        let source = StubSource::new(Freshness::Modified(day(7)));
        let result = classify(&input(2, &due, &events, &map), &source).await;
        assert_eq!(result.final_status(), Some(TimelinessStatus::StaleLink));
    }

    #[tokio::test]
    async fn link_modified_exactly_at_current_deadline_is_stale() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[], None);
        let source = StubSource::new(Freshness::Modified(day(14)));
        let result = classify(&input(2, &due, &events, &map), &source).await;
        assert_eq!(result.final_status(), Some(TimelinessStatus::StaleLink));
    }

    #[tokio::test]
    async fn unavailable_freshness_is_not_a_stale_verdict() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[], None);
        let source = StubSource::new(Freshness::NotAvailable(Unavailable::TimedOut));
        let result = classify(&input(2, &due, &events, &map), &source).await;
        assert_eq!(result.final_status(), Some(TimelinessStatus::NoSubmission));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn link_is_checked_once_per_run() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[], None);
        let source = StubSource::new(Freshness::Modified(day(16)));
        let result = classify(&input(3, &due, &events, &map), &source).await;
        assert_eq!(
            result.statuses(),
            vec![
                Some(TimelinessStatus::OnTime),
                Some(TimelinessStatus::StaleLink),
                Some(TimelinessStatus::LinkUpdated)
            ]
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn a_second_link_after_the_check_is_spent_is_not_checked() {
        let mut due = due_dates();
        due.push(DueDate {
            parent_id: 1,
            round: 4,
            deadline_type: DeadlineType::Submission,
            due_at: day(28),
        });
        let mut moved = event(SubmissionOperation::SubmitHyperlink, day(16));
        moved.content = "https://wiki.example.edu/Team_42_v2".to_string();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2)), moved];
        let map = map(&[], None);
        let source = StubSource::new(Freshness::Modified(day(10)));

        let result = classify(&input(4, &due, &events, &map), &source).await;
        assert_eq!(
            result.statuses(),
            vec![
                Some(TimelinessStatus::OnTime),
                Some(TimelinessStatus::LinkUpdated),
                Some(TimelinessStatus::OnTime),
                Some(TimelinessStatus::NoSubmission)
            ]
        );
        assert!(source.calls() <= 1);
    }

    #[tokio::test]
    async fn final_status_is_the_last_round_even_when_earlier_rounds_were_worse() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitFile, day(9))];
        let map = map(&[], None);
        let result = classify(&input(2, &due, &events, &map), &unavailable()).await;
        assert_eq!(result.statuses()[0], Some(TimelinessStatus::NoSubmission));
        assert_eq!(result.final_status(), Some(TimelinessStatus::OnTime));
    }

    #[tokio::test]
    async fn missing_deadline_leaves_round_unknown() {
        let due: Vec<DueDate> = due_dates().into_iter().take(1).collect();
        let events = vec![event(SubmissionOperation::SubmitFile, day(3))];
        let map = map(&[], None);
        let result = classify(&input(2, &due, &events, &map), &unavailable()).await;
        assert_eq!(result.rounds[0].outcome, Ok(TimelinessStatus::OnTime));
        assert!(matches!(
            result.rounds[1].outcome,
            Err(ClassificationError::Window { round: 2, .. })
        ));
        assert_eq!(result.final_status(), None);
    }

    #[tokio::test]
    async fn dropping_a_run_cancels_its_pending_check() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[], None);
        let source = HangingSource::default();
        let input = input(2, &due, &events, &map);

        let run = classify(&input, &source);
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(50), run).await;
        assert!(outcome.is_err());
        assert!(source.dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn classification_is_idempotent() {
        let due = due_dates();
        let events = vec![event(SubmissionOperation::SubmitHyperlink, day(2))];
        let map = map(&[1], None);
        let source = StubSource::new(Freshness::Modified(day(11)));
        let first = classify(&input(3, &due, &events, &map), &source).await;
        let second = classify(&input(3, &due, &events, &map), &source).await;
        assert_eq!(first, second);
        assert_eq!(first.final_status(), second.final_status());
    }

    #[test]
    fn statuses_order_by_severity() {
        assert!(TimelinessStatus::OnTime < TimelinessStatus::LinkUpdated);
        assert!(TimelinessStatus::StaleLink < TimelinessStatus::NoSubmission);
        assert!(TimelinessStatus::NoSubmission < TimelinessStatus::Graded);
        assert_eq!(TimelinessStatus::StaleLink.as_str(), "stale-link");
    }
}
