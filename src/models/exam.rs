use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One rendition of an exam. `variation_number` starts at 1 per exam.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamVariation {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub variation_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VariationSummary {
    pub id: Uuid,
    pub variation_number: i32,
}

impl From<&ExamVariation> for VariationSummary {
    fn from(v: &ExamVariation) -> Self {
        Self {
            id: v.id,
            variation_number: v.variation_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: Option<String>,
}
