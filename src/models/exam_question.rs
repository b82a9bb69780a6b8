use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam::VariationSummary;
use crate::models::question::{Difficulty, Question};

/// Presentation order and answer key for one variation-question pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffledAlternatives {
    pub alternatives: Vec<String>,
    pub correct_answer: i32,
    pub original_correct_answer: i32,
    pub shuffled_at: DateTime<Utc>,
}

/// Shuffle state of a row. Stored as a nullable JSONB column; `null` means the
/// canonical question order still applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Option<ShuffledAlternatives>",
    into = "Option<ShuffledAlternatives>"
)]
pub enum ShuffleState {
    #[default]
    NotShuffled,
    Shuffled(ShuffledAlternatives),
}

impl ShuffleState {
    pub fn as_shuffled(&self) -> Option<&ShuffledAlternatives> {
        match self {
            ShuffleState::NotShuffled => None,
            ShuffleState::Shuffled(s) => Some(s),
        }
    }
}

impl From<Option<ShuffledAlternatives>> for ShuffleState {
    fn from(value: Option<ShuffledAlternatives>) -> Self {
        match value {
            Some(s) => ShuffleState::Shuffled(s),
            None => ShuffleState::NotShuffled,
        }
    }
}

impl From<Option<Json<ShuffledAlternatives>>> for ShuffleState {
    fn from(value: Option<Json<ShuffledAlternatives>>) -> Self {
        value.map(|Json(s)| s).into()
    }
}

impl From<ShuffleState> for Option<ShuffledAlternatives> {
    fn from(value: ShuffleState) -> Self {
        match value {
            ShuffleState::NotShuffled => None,
            ShuffleState::Shuffled(s) => Some(s),
        }
    }
}

/// Join row binding a question to a variation at a given position.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamQuestion {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub variation_id: Uuid,
    pub question_id: Uuid,
    pub question_order: i32,
    #[sqlx(try_from = "Option<Json<ShuffledAlternatives>>")]
    pub shuffled_alternatives: ShuffleState,
    pub points: Decimal,
    pub metadata: JsonValue,
    /// Bumped on every shuffle write; guards concurrent reshuffles.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<Question>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<VariationSummary>,
}

impl ExamQuestion {
    pub fn loaded_question(&self) -> Result<&Question> {
        self.question
            .as_ref()
            .ok_or(Error::UnloadedDependency("question"))
    }

    /// Answer key in effect: the shuffled key when present, otherwise the
    /// canonical question's.
    pub fn correct_answer(&self) -> Result<i32> {
        match &self.shuffled_alternatives {
            ShuffleState::Shuffled(s) => Ok(s.correct_answer),
            ShuffleState::NotShuffled => Ok(self.loaded_question()?.correct_answer),
        }
    }

    /// Alternatives in the order this variation presents them.
    pub fn presented_alternatives(&self) -> Result<&[String]> {
        match &self.shuffled_alternatives {
            ShuffleState::Shuffled(s) => Ok(s.alternatives.as_slice()),
            ShuffleState::NotShuffled => Ok(self.loaded_question()?.alternatives.as_slice()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewExamQuestion {
    pub exam_id: Uuid,
    pub variation_id: Uuid,
    pub question_id: Uuid,
    pub question_order: i32,
    pub points: Decimal,
    pub metadata: JsonValue,
}

/// A question picked for a variation, with an optional exam-specific
/// point override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSelection {
    pub question_id: Uuid,
    /// The question's own default points.
    #[serde(default)]
    pub points: Option<Decimal>,
    #[serde(default)]
    pub exam_points: Option<Decimal>,
}

impl QuestionSelection {
    pub fn resolved_points(&self) -> Decimal {
        self.exam_points.or(self.points).unwrap_or(Decimal::ONE)
    }
}

pub fn min_points() -> Decimal {
    Decimal::new(1, 1)
}

pub fn max_points() -> Decimal {
    Decimal::new(100, 0)
}

pub fn validate_points(points: Decimal) -> Result<()> {
    if points < min_points() || points > max_points() {
        return Err(Error::BadRequest(format!(
            "points must be between {} and {}, got {}",
            min_points(),
            max_points(),
            points
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindOptions {
    pub difficulty: Option<Difficulty>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FindOptions {
    /// Negative `limit` or `offset` is a `BadRequest` in every store.
    pub fn check_paging(&self) -> Result<()> {
        for (name, value) in [("limit", self.limit), ("offset", self.offset)] {
            if let Some(v) = value.filter(|v| *v < 0) {
                return Err(Error::BadRequest(format!(
                    "{} must be non-negative, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    pub total_points: Decimal,
}

impl DifficultyBreakdown {
    pub fn record(&mut self, difficulty: Difficulty, points: Decimal) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
        self.total_points += points;
    }
}
