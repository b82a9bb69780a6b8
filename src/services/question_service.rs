use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::database::store::ExamStore;
use crate::dto::exam_dto::CreateQuestionRequest;
use crate::error::{Error, Result};
use crate::models::exam_question::validate_points;
use crate::models::question::{Difficulty, NewQuestion, Question};

#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn ExamStore>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    pub async fn create_question(&self, payload: CreateQuestionRequest) -> Result<Question> {
        payload.validate()?;

        if payload.alternatives.iter().any(|a| a.trim().is_empty()) {
            return Err(Error::BadRequest(
                "alternatives must not be blank".to_string(),
            ));
        }
        if payload.correct_answer < 0
            || payload.correct_answer as usize >= payload.alternatives.len()
        {
            return Err(Error::BadRequest(format!(
                "correct_answer {} is outside the {} alternatives",
                payload.correct_answer,
                payload.alternatives.len()
            )));
        }
        let points = payload.points.unwrap_or(Decimal::ONE);
        validate_points(points)?;

        let question = self
            .store
            .insert_question(NewQuestion {
                statement: payload.statement,
                alternatives: payload.alternatives,
                correct_answer: payload.correct_answer,
                difficulty: payload.difficulty,
                points,
                explanation: payload.explanation,
            })
            .await?;
        tracing::info!(question_id = %question.id, difficulty = %question.difficulty, "question created");
        Ok(question)
    }

    pub async fn get_question(&self, id: Uuid) -> Result<Question> {
        self.store.get_question(id).await
    }

    pub async fn list_questions(&self, difficulty: Option<Difficulty>) -> Result<Vec<Question>> {
        self.store.list_questions(difficulty).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryExamStore;
    use tokio_test::assert_ok;

    fn payload(alternatives: &[&str], correct: i32) -> CreateQuestionRequest {
        CreateQuestionRequest {
            statement: "2 + 2?".into(),
            alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct,
            difficulty: Difficulty::Medium,
            points: None,
            explanation: None,
        }
    }

    #[tokio::test]
    async fn creates_with_default_points() {
        let svc = QuestionService::new(Arc::new(MemoryExamStore::new()));
        let q = assert_ok!(svc.create_question(payload(&["3", "4"], 1)).await);
        assert_eq!(q.points, Decimal::ONE);
        assert_eq!(q.correct_text(), Some("4"));
    }

    #[tokio::test]
    async fn rejects_out_of_range_key_and_single_alternative() {
        let svc = QuestionService::new(Arc::new(MemoryExamStore::new()));
        assert!(matches!(
            svc.create_question(payload(&["3", "4"], 2)).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            svc.create_question(payload(&["4"], 0)).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejects_points_outside_range() {
        let svc = QuestionService::new(Arc::new(MemoryExamStore::new()));
        let mut p = payload(&["3", "4"], 1);
        p.points = Some(Decimal::new(5, 2));
        assert!(matches!(
            svc.create_question(p).await,
            Err(Error::BadRequest(_))
        ));
    }
}
