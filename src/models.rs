use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub round_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    Submission,
    Review,
    Other,
}

impl DeadlineType {
    /// Maps the platform's `deadline_type_id` column onto a deadline kind.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => DeadlineType::Submission,
            2 => DeadlineType::Review,
            _ => DeadlineType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueDate {
    pub parent_id: i64,
    pub round: u32,
    pub deadline_type: DeadlineType,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOperation {
    #[serde(rename = "Submit File")]
    SubmitFile,
    #[serde(rename = "Submit Hyperlink")]
    SubmitHyperlink,
    #[serde(rename = "Remove File")]
    RemoveFile,
    #[serde(rename = "Remove Hyperlink")]
    RemoveHyperlink,
    #[serde(other)]
    Other,
}

impl SubmissionOperation {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Submit File" => SubmissionOperation::SubmitFile,
            "Submit Hyperlink" => SubmissionOperation::SubmitHyperlink,
            "Remove File" => SubmissionOperation::RemoveFile,
            "Remove Hyperlink" => SubmissionOperation::RemoveHyperlink,
            _ => SubmissionOperation::Other,
        }
    }

    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            SubmissionOperation::SubmitFile | SubmissionOperation::SubmitHyperlink
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub team_id: i64,
    pub operation: SubmissionOperation,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    Review,
    Feedback,
    Other,
}

impl MapKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "ReviewResponseMap" => MapKind::Review,
            "FeedbackResponseMap" => MapKind::Feedback,
            _ => MapKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub round: u32,
    #[serde(default)]
    pub comments: Vec<String>,
    /// Weighted score as a percentage of the questionnaire maximum, once scored.
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMap {
    pub id: i64,
    pub reviewer_id: i64,
    pub reviewee_id: i64,
    pub reviewed_object_id: i64,
    pub kind: MapKind,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub reviewer_grade: Option<f64>,
}

impl ResponseMap {
    pub fn has_response(&self) -> bool {
        !self.responses.is_empty()
    }

    pub fn has_response_for_round(&self, round: u32) -> bool {
        self.responses.iter().any(|response| response.round == round)
    }

    pub fn has_final_grade(&self) -> bool {
        self.reviewer_grade.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reviewer {
    pub participant_id: i64,
    pub name: String,
}

/// Everything one report run reads, captured once up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSnapshot {
    pub assignment: Assignment,
    pub due_dates: Vec<DueDate>,
    pub submissions: Vec<SubmissionEvent>,
    pub response_maps: Vec<ResponseMap>,
    pub reviewers: Vec<Reviewer>,
    pub team_ids: Vec<i64>,
}

impl AssignmentSnapshot {
    pub fn maps_for_reviewer(&self, reviewer_id: i64, kind: MapKind) -> Vec<ResponseMap> {
        self.response_maps
            .iter()
            .filter(|map| map.reviewer_id == reviewer_id && map.kind == kind)
            .cloned()
            .collect()
    }
}
