use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::{
    Assignment, AssignmentSnapshot, DeadlineType, DueDate, MapKind, Response, ResponseMap,
    Reviewer, SubmissionEvent, SubmissionOperation,
};

/// Exactly one row per map; the grade is the reviewer's earliest grade record.
const RESPONSE_MAPS_SQL: &str = "SELECT rm.id, rm.reviewer_id, rm.reviewee_id, \
     rm.reviewed_object_id, rm.type, \
     (SELECT rg.grade_for_reviewer::float8 FROM review_grades rg \
      WHERE rg.participant_id = rm.reviewer_id \
      ORDER BY rg.id LIMIT 1) AS grade \
     FROM response_maps rm \
     WHERE rm.reviewed_object_id = $1 \
     ORDER BY rm.id";

/// Weighted answer total of each response as a percentage of the questionnaire maximum.
const RESPONSE_SCORES_SQL: &str = "SELECT r.id AS response_id, \
     (100.0 * SUM(a.answer * q.weight) \
      / NULLIF(SUM(qn.max_question_score * q.weight), 0))::float8 AS score \
     FROM answers a \
     JOIN questions q ON q.id = a.question_id \
     JOIN questionnaires qn ON qn.id = q.questionnaire_id \
     JOIN responses r ON r.id = a.response_id \
     JOIN response_maps rm ON rm.id = r.map_id \
     WHERE rm.reviewed_object_id = $1 AND a.answer IS NOT NULL \
     GROUP BY r.id";

pub async fn fetch_snapshot(
    pool: &PgPool,
    assignment_id: i64,
) -> anyhow::Result<AssignmentSnapshot> {
    let row = sqlx::query(
        "SELECT id, name, created_at, rounds_of_reviews FROM assignments WHERE id = $1",
    )
    .bind(assignment_id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("assignment {assignment_id} not found"))?;

    let rounds: i32 = row.get("rounds_of_reviews");
    let assignment = Assignment {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        round_count: u32::try_from(rounds).unwrap_or(0),
    };

    let due_dates = fetch_due_dates(pool, assignment_id).await?;
    let submissions = fetch_submissions(pool, assignment_id).await?;
    let response_maps = fetch_response_maps(pool, assignment_id).await?;
    let reviewers = fetch_reviewers(pool, assignment_id).await?;

    let team_ids: Vec<i64> = sqlx::query("SELECT id FROM teams WHERE parent_id = $1")
        .bind(assignment_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get("id"))
        .collect();

    info!(
        assignment_id,
        due_dates = due_dates.len(),
        submissions = submissions.len(),
        response_maps = response_maps.len(),
        teams = team_ids.len(),
        "loaded assignment snapshot"
    );

    Ok(AssignmentSnapshot {
        assignment,
        due_dates,
        submissions,
        response_maps,
        reviewers,
        team_ids,
    })
}

async fn fetch_due_dates(pool: &PgPool, assignment_id: i64) -> anyhow::Result<Vec<DueDate>> {
    let rows = sqlx::query(
        "SELECT parent_id, round, deadline_type_id, due_at \
         FROM due_dates WHERE parent_id = $1 AND round IS NOT NULL \
         ORDER BY id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    let mut due_dates = Vec::new();
    for row in rows {
        let round: i32 = row.get("round");
        let Ok(round) = u32::try_from(round) else {
            continue;
        };
        due_dates.push(DueDate {
            parent_id: row.get("parent_id"),
            round,
            deadline_type: DeadlineType::from_id(row.get("deadline_type_id")),
            due_at: row.get("due_at"),
        });
    }

    Ok(due_dates)
}

async fn fetch_submissions(
    pool: &PgPool,
    assignment_id: i64,
) -> anyhow::Result<Vec<SubmissionEvent>> {
    let rows = sqlx::query(
        "SELECT team_id, operation, content, created_at \
         FROM submission_records WHERE assignment_id = $1 \
         ORDER BY id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    let mut submissions = Vec::new();
    for row in rows {
        let operation: String = row.get("operation");
        let content: Option<String> = row.get("content");
        submissions.push(SubmissionEvent {
            team_id: row.get("team_id"),
            operation: SubmissionOperation::from_label(&operation),
            content: content.unwrap_or_default(),
            created_at: row.get("created_at"),
        });
    }

    Ok(submissions)
}

async fn fetch_response_maps(
    pool: &PgPool,
    assignment_id: i64,
) -> anyhow::Result<Vec<ResponseMap>> {
    let map_rows = sqlx::query(RESPONSE_MAPS_SQL)
        .bind(assignment_id)
        .fetch_all(pool)
        .await?;

    let response_rows = sqlx::query(
        "SELECT r.id, r.map_id, r.round, r.additional_comment \
         FROM responses r \
         JOIN response_maps rm ON rm.id = r.map_id \
         WHERE rm.reviewed_object_id = $1 AND r.round IS NOT NULL \
         ORDER BY r.id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query(
        "SELECT a.response_id, a.comments \
         FROM answers a \
         JOIN responses r ON r.id = a.response_id \
         JOIN response_maps rm ON rm.id = r.map_id \
         WHERE rm.reviewed_object_id = $1 AND a.comments IS NOT NULL \
         ORDER BY a.id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    let score_rows = sqlx::query(RESPONSE_SCORES_SQL)
        .bind(assignment_id)
        .fetch_all(pool)
        .await?;

    let mut scores: HashMap<i64, f64> = HashMap::new();
    for row in score_rows {
        if let Some(score) = row.get::<Option<f64>, _>("score") {
            scores.insert(row.get("response_id"), score);
        }
    }

    let mut comments: HashMap<i64, Vec<String>> = HashMap::new();
    for row in answer_rows {
        comments
            .entry(row.get("response_id"))
            .or_default()
            .push(row.get("comments"));
    }

    let mut responses: HashMap<i64, Vec<Response>> = HashMap::new();
    for row in response_rows {
        let response_id: i64 = row.get("id");
        let round: i32 = row.get("round");
        let Ok(round) = u32::try_from(round) else {
            continue;
        };
        let mut texts = comments.remove(&response_id).unwrap_or_default();
        if let Some(extra) = row.get::<Option<String>, _>("additional_comment") {
            texts.push(extra);
        }
        responses
            .entry(row.get("map_id"))
            .or_default()
            .push(Response {
                round,
                comments: texts,
                score: scores.get(&response_id).copied(),
            });
    }

    let mut maps = Vec::new();
    for row in map_rows {
        let id: i64 = row.get("id");
        let type_name: String = row.get("type");
        maps.push(ResponseMap {
            id,
            reviewer_id: row.get("reviewer_id"),
            reviewee_id: row.get("reviewee_id"),
            reviewed_object_id: row.get("reviewed_object_id"),
            kind: MapKind::from_type_name(&type_name),
            responses: responses.remove(&id).unwrap_or_default(),
            reviewer_grade: row.get("grade"),
        });
    }

    Ok(maps)
}

async fn fetch_reviewers(pool: &PgPool, assignment_id: i64) -> anyhow::Result<Vec<Reviewer>> {
    let rows = sqlx::query(
        "SELECT p.id, u.fullname \
         FROM participants p \
         JOIN users u ON u.id = p.user_id \
         WHERE p.parent_id = $1 \
         ORDER BY p.id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Reviewer {
            participant_id: row.get("id"),
            name: row.get("fullname"),
        })
        .collect())
}

/// Tagging timestamps for one reviewer, oldest first.
pub async fn fetch_tag_timestamps(
    pool: &PgPool,
    assignment_id: i64,
    reviewer_id: i64,
) -> anyhow::Result<Vec<DateTime<Utc>>> {
    let rows = sqlx::query(
        "SELECT tag.created_at \
         FROM answer_tags tag \
         JOIN answers a ON a.id = tag.answer_id \
         JOIN responses r ON r.id = a.response_id \
         JOIN response_maps rm ON rm.id = r.map_id \
         WHERE rm.reviewed_object_id = $1 AND rm.reviewer_id = $2 \
         ORDER BY tag.created_at",
    )
    .bind(assignment_id)
    .bind(reviewer_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("created_at")).collect())
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<AssignmentSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Reads the `interval` column of a CSV export.
pub fn read_intervals_csv(csv_path: &Path) -> anyhow::Result<Vec<f64>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        interval: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut intervals = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        intervals.push(row.interval);
    }

    Ok(intervals)
}
