use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::dto::exam_dto::{CreateQuestionRequest, ListQuestionsQuery};
use crate::error::Result;
use crate::models::question::Question;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<Question>)> {
    let question = state.question_service.create_question(req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<Vec<Question>>> {
    let questions = state
        .question_service
        .list_questions(query.difficulty)
        .await?;
    Ok(Json(questions))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Question>> {
    Ok(Json(state.question_service.get_question(id).await?))
}
