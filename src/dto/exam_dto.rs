use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::exam::ExamVariation;
use crate::models::exam_question::ExamQuestion;
use crate::models::question::Difficulty;
use crate::services::grading_service::SubmittedAnswer;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub statement: String,
    #[validate(length(min = 2, max = 10, message = "A question needs 2 to 10 alternatives"))]
    pub alternatives: Vec<String>,
    pub correct_answer: i32,
    pub difficulty: Difficulty,
    pub points: Option<Decimal>,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuestionsQuery {
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPick {
    pub question_id: Uuid,
    /// Overrides the question's own points for this exam.
    pub exam_points: Option<Decimal>,
}

fn default_true() -> bool {
    true
}

fn default_variation_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateVariationsRequest {
    #[validate(length(min = 1, message = "Select at least one question"))]
    pub questions: Vec<QuestionPick>,
    #[serde(default = "default_variation_count")]
    #[validate(range(min = 1, max = 26))]
    pub variation_count: u32,
    #[serde(default = "default_true")]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub shuffle_alternatives: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedVariation {
    pub variation: ExamVariation,
    pub questions: Vec<ExamQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAnswerRequest {
    pub answer: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<SubmittedAnswer>,
}
