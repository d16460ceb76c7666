use std::collections::HashSet;

use serde::Serialize;

use crate::models::{MapKind, ResponseMap};

/// Entry `r` is the number of maps holding a response for round `r + 1`.
pub fn count_by_round(response_maps: &[ResponseMap], round_count: u32) -> Vec<usize> {
    (1..=round_count)
        .map(|round| {
            response_maps
                .iter()
                .filter(|map| map.has_response_for_round(round))
                .count()
        })
        .collect()
}

/// Like [`count_by_round`] but counts every response record, including repeats within a map.
pub fn count_responses_by_round(response_maps: &[ResponseMap], round_count: u32) -> Vec<usize> {
    let mut counts = vec![0usize; round_count as usize];
    for response in response_maps.iter().flat_map(|map| map.responses.iter()) {
        if response.round >= 1 && response.round <= round_count {
            counts[(response.round - 1) as usize] += 1;
        }
    }
    counts
}

/// Drops maps whose reviewee team no longer exists.
pub fn reviewable_maps(response_maps: &[ResponseMap], team_ids: &[i64]) -> Vec<ResponseMap> {
    let teams: HashSet<i64> = team_ids.iter().copied().collect();
    response_maps
        .iter()
        .filter(|map| teams.contains(&map.reviewee_id))
        .cloned()
        .collect()
}

/// Score awarded through one map for each round. The latest scored response in a round wins.
pub fn awarded_scores(map: &ResponseMap, round_count: u32) -> Vec<Option<f64>> {
    (1..=round_count)
        .map(|round| {
            map.responses
                .iter()
                .filter(|response| response.round == round)
                .filter_map(|response| response.score)
                .last()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreRange {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
}

/// Spread of the scores all reviewers awarded one team, per round.
pub fn score_ranges(
    response_maps: &[ResponseMap],
    team_id: i64,
    round_count: u32,
) -> Vec<Option<ScoreRange>> {
    let awarded: Vec<Vec<Option<f64>>> = response_maps
        .iter()
        .filter(|map| map.kind == MapKind::Review && map.reviewee_id == team_id)
        .map(|map| awarded_scores(map, round_count))
        .collect();

    (0..round_count as usize)
        .map(|slot| {
            let scores: Vec<f64> = awarded.iter().filter_map(|rounds| rounds[slot]).collect();
            if scores.is_empty() {
                return None;
            }
            Some(ScoreRange {
                max: scores.iter().copied().fold(f64::MIN, f64::max),
                min: scores.iter().copied().fold(f64::MAX, f64::min),
                avg: scores.iter().sum::<f64>() / scores.len() as f64,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewProgress {
    NotStarted,
    InProgress,
    AllRounds,
}

impl ReviewProgress {
    pub fn of(map: &ResponseMap, round_count: u32) -> Self {
        if !map.has_response() {
            ReviewProgress::NotStarted
        } else if (1..=round_count).all(|round| map.has_response_for_round(round)) {
            ReviewProgress::AllRounds
        } else {
            ReviewProgress::InProgress
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewProgress::NotStarted => "not started",
            ReviewProgress::InProgress => "in progress",
            ReviewProgress::AllRounds => "all rounds",
        }
    }
}
