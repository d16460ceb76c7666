use serde::Serialize;

use crate::models::{Response, ResponseMap};

pub const TOTAL_LABEL: &str = "Total";

/// Average words a reviewer wrote per response, overall and per round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewVolume {
    pub overall: f64,
    pub per_round: Vec<f64>,
}

impl ReviewVolume {
    /// Overall average first, then one entry per round.
    pub fn to_vec(&self) -> Vec<f64> {
        std::iter::once(self.overall)
            .chain(self.per_round.iter().copied())
            .collect()
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

fn response_words(response: &Response) -> usize {
    response.comments.iter().map(|comment| word_count(comment)).sum()
}

fn average(total: usize, count: usize) -> f64 {
    (total as f64 / count.max(1) as f64).round()
}

/// Only the last response a map holds for a round is counted.
pub fn review_volume(response_maps: &[ResponseMap], round_count: u32) -> ReviewVolume {
    let mut words = vec![0usize; round_count as usize];
    let mut responses = vec![0usize; round_count as usize];

    for map in response_maps {
        for round in 1..=round_count {
            let Some(last) = map.responses.iter().filter(|r| r.round == round).last() else {
                continue;
            };
            let slot = (round - 1) as usize;
            words[slot] += response_words(last);
            responses[slot] += 1;
        }
    }

    ReviewVolume {
        overall: average(words.iter().sum(), responses.iter().sum()),
        per_round: words
            .iter()
            .zip(responses.iter())
            .map(|(total, count)| average(*total, *count))
            .collect(),
    }
}

/// Mean volume across all reviewers of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBaseline {
    pub overall: f64,
    pub per_round: Vec<f64>,
}

impl VolumeBaseline {
    pub fn from_reviewers(volumes: &[ReviewVolume], round_count: u32) -> Self {
        let reviewers = volumes.len().max(1) as f64;
        let per_round = (0..round_count as usize)
            .map(|slot| {
                volumes
                    .iter()
                    .map(|volume| volume.per_round.get(slot).copied().unwrap_or(0.0))
                    .sum::<f64>()
                    / reviewers
            })
            .collect();

        Self {
            overall: volumes.iter().map(|volume| volume.overall).sum::<f64>() / reviewers,
            per_round,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeChartRow {
    pub label: String,
    pub reviewer: f64,
    pub all_reviewers: f64,
}

/// One row per round with a positive baseline, then a closing "Total" row.
pub fn volume_chart_rows(
    reviewer: &ReviewVolume,
    baseline: &VolumeBaseline,
) -> Vec<VolumeChartRow> {
    let mut rows: Vec<VolumeChartRow> = baseline
        .per_round
        .iter()
        .enumerate()
        .filter(|(_, average)| **average > 0.0)
        .map(|(slot, average)| VolumeChartRow {
            label: (slot + 1).to_string(),
            reviewer: reviewer.per_round.get(slot).copied().unwrap_or(0.0),
            all_reviewers: *average,
        })
        .collect();

    rows.push(VolumeChartRow {
        label: TOTAL_LABEL.to_string(),
        reviewer: reviewer.overall,
        all_reviewers: baseline.overall,
    });
    rows
}

pub fn sort_by_volume_desc<T>(items: &mut [T], volume: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        volume(b)
            .partial_cmp(&volume(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
