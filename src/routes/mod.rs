pub mod exam_questions;
pub mod exams;
pub mod health;
pub mod questions;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::cors::api_cors;
use crate::middleware::rate_limit::{rate_limit, RateLimiter};
use crate::AppState;

/// Assembles the application router. `/health` sits outside the rate limit.
pub fn create_router(state: AppState, api_rps: u32) -> Router {
    let api = Router::new()
        .route(
            "/api/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/api/questions/:id", get(questions::get_question))
        .route("/api/exams", post(exams::create_exam))
        .route(
            "/api/exams/:id",
            get(exams::get_exam).delete(exams::delete_exam),
        )
        .route(
            "/api/exams/:id/variations",
            post(exams::generate_variations),
        )
        .route(
            "/api/exams/:id/questions",
            get(exams::list_exam_questions),
        )
        .route(
            "/api/variations/:id",
            axum::routing::delete(exam_questions::delete_variation),
        )
        .route(
            "/api/variations/:id/questions",
            get(exam_questions::list_variation_questions),
        )
        .route(
            "/api/variations/:id/difficulty",
            get(exam_questions::difficulty_breakdown),
        )
        .route(
            "/api/variations/:id/submissions",
            post(exam_questions::submit_answers),
        )
        .route(
            "/api/exam-questions/:id/shuffle",
            post(exam_questions::shuffle),
        )
        .route(
            "/api/exam-questions/:id/check",
            post(exam_questions::check_answer),
        )
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new(api_rps),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
}
