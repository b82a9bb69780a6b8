pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::store::ExamStore;
use crate::services::{
    exam_question_service::ExamQuestionService, exam_service::ExamService,
    question_service::QuestionService, shuffle_service::ShuffleRng,
};

pub use routes::create_router;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub question_service: QuestionService,
    pub exam_service: ExamService,
    pub exam_question_service: ExamQuestionService,
}

impl AppState {
    pub fn new(store: Arc<dyn ExamStore>, config: &Config) -> Self {
        let rng = ShuffleRng::new(config.shuffle_seed);

        let question_service = QuestionService::new(store.clone());
        let exam_question_service = ExamQuestionService::new(store.clone(), rng.clone());
        let exam_service = ExamService::new(store.clone(), exam_question_service.clone(), rng);

        Self {
            store,
            question_service,
            exam_service,
            exam_question_service,
        }
    }
}
