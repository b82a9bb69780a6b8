use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::dto::exam_dto::{CreateExamRequest, GenerateVariationsRequest, GeneratedVariation};
use crate::error::Result;
use crate::models::exam::Exam;
use crate::models::exam_question::{ExamQuestion, FindOptions};
use crate::AppState;

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Json(req): Json<CreateExamRequest>,
) -> Result<(StatusCode, Json<Exam>)> {
    let exam = state.exam_service.create_exam(req).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

#[axum::debug_handler]
pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Exam>> {
    Ok(Json(state.exam_service.get_exam(id).await?))
}

#[axum::debug_handler]
pub async fn delete_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.exam_service.delete_exam(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn generate_variations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateVariationsRequest>,
) -> Result<(StatusCode, Json<Vec<GeneratedVariation>>)> {
    let generated = state.exam_service.generate_variations(id, req).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

#[axum::debug_handler]
pub async fn list_exam_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(options): Query<FindOptions>,
) -> Result<Json<Vec<ExamQuestion>>> {
    state.exam_service.get_exam(id).await?;
    let rows = state
        .exam_question_service
        .find_by_exam(id, &options)
        .await?;
    Ok(Json(rows))
}
