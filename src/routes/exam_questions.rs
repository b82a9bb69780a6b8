use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::dto::exam_dto::{CheckAnswerRequest, SubmitAnswersRequest};
use crate::error::Result;
use crate::models::exam_question::{DifficultyBreakdown, ExamQuestion, FindOptions};
use crate::services::grading_service::{AnswerCheck, SubmissionResult};
use crate::AppState;

#[axum::debug_handler]
pub async fn list_variation_questions(
    State(state): State<AppState>,
    Path(variation_id): Path<Uuid>,
    Query(options): Query<FindOptions>,
) -> Result<Json<Vec<ExamQuestion>>> {
    let rows = state
        .exam_question_service
        .find_by_variation(variation_id, &options)
        .await?;
    Ok(Json(rows))
}

#[axum::debug_handler]
pub async fn difficulty_breakdown(
    State(state): State<AppState>,
    Path(variation_id): Path<Uuid>,
) -> Result<Json<DifficultyBreakdown>> {
    let breakdown = state
        .exam_question_service
        .get_questions_by_difficulty(variation_id)
        .await?;
    Ok(Json(breakdown))
}

#[axum::debug_handler]
pub async fn delete_variation(
    State(state): State<AppState>,
    Path(variation_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.exam_service.delete_variation(variation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Path(variation_id): Path<Uuid>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<Json<SubmissionResult>> {
    let result = state
        .exam_question_service
        .grade_submission(variation_id, &req.answers)
        .await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn shuffle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExamQuestion>> {
    let row = state.exam_question_service.shuffle_and_store(id).await?;
    Ok(Json(row))
}

#[axum::debug_handler]
pub async fn check_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CheckAnswerRequest>,
) -> Result<Json<AnswerCheck>> {
    let check = state
        .exam_question_service
        .check_answer(id, &req.answer)
        .await?;
    Ok(Json(check))
}
