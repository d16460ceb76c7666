use std::fmt::Write;

use crate::freshness::FreshnessSource;
use crate::metrics::{self, ReviewProgress, ScoreRange};
use crate::models::{AssignmentSnapshot, MapKind, Reviewer};
use crate::stats::IntervalStats;
use crate::timeliness::{self, Classification, ClassificationInput, TimelinessStatus};
use crate::volume::{self, ReviewVolume, VolumeBaseline};
use crate::window;

/// Shown wherever a figure is unavailable.
pub const PLACEHOLDER: &str = "-----";

#[derive(Debug, Clone)]
pub struct RevieweeRow {
    pub map_id: i64,
    pub reviewee_id: i64,
    pub progress: ReviewProgress,
    pub classification: Classification,
    /// Score this reviewer awarded the team, per round.
    pub awarded: Vec<Option<f64>>,
    /// Max/min/avg of every reviewer's score for the team, per round.
    pub score_ranges: Vec<Option<ScoreRange>>,
}

#[derive(Debug, Clone)]
pub struct ReviewerRow {
    pub reviewer: Reviewer,
    pub response_counts: Vec<usize>,
    pub volume: ReviewVolume,
    pub reviewees: Vec<RevieweeRow>,
}

pub fn status_label(status: Option<TimelinessStatus>) -> &'static str {
    status.map(|status| status.as_str()).unwrap_or("unknown")
}

/// Whole-number percentage, or the placeholder.
pub fn percent_label(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{:.0}%", score.round()),
        None => PLACEHOLDER.to_string(),
    }
}

fn round_scores_line(round: usize, awarded: Option<f64>, range: Option<&ScoreRange>) -> String {
    let (max, min, avg) = match range {
        Some(range) => (Some(range.max), Some(range.min), Some(range.avg)),
        None => (None, None, None),
    };
    format!(
        "round {}: awarded {}, team max {} / min {} / avg {}",
        round,
        percent_label(awarded),
        percent_label(max),
        percent_label(min),
        percent_label(avg)
    )
}

/// Classifies every reviewee of every reviewer, ordered by review volume (highest first).
pub async fn build_reviewer_rows<S: FreshnessSource>(
    snapshot: &AssignmentSnapshot,
    freshness: &S,
) -> Vec<ReviewerRow> {
    let round_count = snapshot.assignment.round_count;
    let mut rows = Vec::new();

    for reviewer in &snapshot.reviewers {
        let maps = snapshot.maps_for_reviewer(reviewer.participant_id, MapKind::Review);
        if maps.is_empty() {
            continue;
        }

        let response_counts = metrics::count_by_round(&maps, round_count);
        let reviewable = metrics::reviewable_maps(&maps, &snapshot.team_ids);
        let mut reviewees = Vec::with_capacity(reviewable.len());

        for map in &reviewable {
            let input = ClassificationInput {
                reviewee_team_id: map.reviewee_id,
                round_count,
                assignment_created_at: snapshot.assignment.created_at,
                due_dates: &snapshot.due_dates,
                submissions: &snapshot.submissions,
                response_map: map,
            };
            reviewees.push(RevieweeRow {
                map_id: map.id,
                reviewee_id: map.reviewee_id,
                progress: ReviewProgress::of(map, round_count),
                classification: timeliness::classify(&input, freshness).await,
                awarded: metrics::awarded_scores(map, round_count),
                score_ranges: metrics::score_ranges(
                    &snapshot.response_maps,
                    map.reviewee_id,
                    round_count,
                ),
            });
        }

        rows.push(ReviewerRow {
            reviewer: reviewer.clone(),
            response_counts,
            volume: volume::review_volume(&reviewable, round_count),
            reviewees,
        });
    }

    volume::sort_by_volume_desc(&mut rows, |row| row.volume.overall);
    rows
}

pub fn build_report(
    snapshot: &AssignmentSnapshot,
    rows: &[ReviewerRow],
    intervals: Option<&IntervalStats>,
) -> String {
    let round_count = snapshot.assignment.round_count;
    let volumes: Vec<ReviewVolume> = rows.iter().map(|row| row.volume.clone()).collect();
    let baseline = VolumeBaseline::from_reviewers(&volumes, round_count);

    let mut output = String::new();

    let _ = writeln!(output, "# Review Report");
    let _ = writeln!(
        output,
        "Generated for {} (#{}, {} review rounds, created {})",
        snapshot.assignment.name,
        snapshot.assignment.id,
        round_count,
        snapshot.assignment.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Round Windows");

    for (slot, window) in window::resolve_windows(
        round_count,
        &snapshot.due_dates,
        snapshot.assignment.created_at,
    )
    .iter()
    .enumerate()
    {
        match window {
            Ok(window) => {
                let _ = writeln!(
                    output,
                    "- Round {}: {} to {}",
                    window.round,
                    window.start.format("%Y-%m-%d %H:%M"),
                    window.end.format("%Y-%m-%d %H:%M")
                );
            }
            Err(err) => {
                let _ = writeln!(output, "- Round {}: unknown ({})", slot + 1, err);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reviewers");

    if rows.is_empty() {
        let _ = writeln!(output, "No reviewers with review assignments.");
    }

    for row in rows {
        let counts: Vec<String> = row
            .response_counts
            .iter()
            .enumerate()
            .map(|(slot, count)| format!("round {}: {}", slot + 1, count))
            .collect();

        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", row.reviewer.name);
        let _ = writeln!(
            output,
            "- Reviews assigned: {} ({})",
            row.reviewees.len(),
            counts.join(", ")
        );

        let chart = volume::volume_chart_rows(&row.volume, &baseline);
        let volumes: Vec<String> = chart
            .iter()
            .map(|entry| {
                format!(
                    "{} {:.0} (avg {:.0})",
                    entry.label, entry.reviewer, entry.all_reviewers
                )
            })
            .collect();
        let _ = writeln!(output, "- Comment volume: {}", volumes.join(", "));

        for reviewee in &row.reviewees {
            let per_round: Vec<&str> = reviewee
                .classification
                .statuses()
                .into_iter()
                .map(status_label)
                .collect();
            let _ = writeln!(
                output,
                "- Team {} (map {}): {} [{}], review {}",
                reviewee.reviewee_id,
                reviewee.map_id,
                status_label(reviewee.classification.final_status()),
                per_round.join(" / "),
                reviewee.progress.as_str()
            );

            let scores: Vec<String> = reviewee
                .awarded
                .iter()
                .enumerate()
                .map(|(slot, awarded)| {
                    round_scores_line(slot + 1, *awarded, reviewee.score_ranges[slot].as_ref())
                })
                .collect();
            let _ = writeln!(output, "  - Scores: {}", scores.join("; "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tagging Intervals");

    match intervals {
        Some(stats) => {
            let _ = writeln!(
                output,
                "- {} samples: mean {}, min {}, max {}, variance {}, std dev {}",
                stats.count, stats.mean, stats.min, stats.max, stats.variance, stats.stddev
            );
        }
        None => {
            let _ = writeln!(output, "- {}", PLACEHOLDER);
        }
    }

    output
}
