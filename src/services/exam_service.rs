use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;
use uuid::Uuid;
use validator::Validate;

use crate::database::store::ExamStore;
use crate::dto::exam_dto::{CreateExamRequest, GenerateVariationsRequest, GeneratedVariation};
use crate::error::{Error, Result};
use crate::models::exam::{Exam, ExamVariation, NewExam};
use crate::models::exam_question::{ExamQuestion, QuestionSelection};
use crate::models::question::Question;
use crate::services::exam_question_service::ExamQuestionService;
use crate::services::shuffle_service::ShuffleRng;

#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
    exam_questions: ExamQuestionService,
    rng: ShuffleRng,
}

impl ExamService {
    pub fn new(
        store: Arc<dyn ExamStore>,
        exam_questions: ExamQuestionService,
        rng: ShuffleRng,
    ) -> Self {
        Self {
            store,
            exam_questions,
            rng,
        }
    }

    pub async fn create_exam(&self, payload: CreateExamRequest) -> Result<Exam> {
        payload.validate()?;
        let exam = self
            .store
            .insert_exam(NewExam {
                title: payload.title,
                description: payload.description,
            })
            .await?;
        tracing::info!(exam_id = %exam.id, "exam created");
        Ok(exam)
    }

    pub async fn get_exam(&self, id: Uuid) -> Result<Exam> {
        self.store.get_exam(id).await
    }

    pub async fn delete_exam(&self, id: Uuid) -> Result<()> {
        self.store.delete_exam(id).await?;
        tracing::info!(exam_id = %id, "exam deleted");
        Ok(())
    }

    pub async fn delete_variation(&self, id: Uuid) -> Result<()> {
        self.store.delete_variation(id).await?;
        tracing::info!(variation_id = %id, "variation deleted");
        Ok(())
    }

    /// Adds `variation_count` variations to an exam. Each one gets its own
    /// question order (when `shuffle_questions`) and its own alternative
    /// order per row (when `shuffle_alternatives`).
    pub async fn generate_variations(
        &self,
        exam_id: Uuid,
        payload: GenerateVariationsRequest,
    ) -> Result<Vec<GeneratedVariation>> {
        payload.validate()?;
        self.store.get_exam(exam_id).await?;

        let selections = self.resolve_selections(&payload).await?;

        let mut generated = Vec::with_capacity(payload.variation_count as usize);
        for _ in 0..payload.variation_count {
            let mut order = selections.clone();
            if payload.shuffle_questions {
                self.rng.with(|rng| order.shuffle(rng));
            }

            let variation = self.store.insert_variation(exam_id).await?;
            let questions = match self
                .populate_variation(&variation, &order, payload.shuffle_alternatives)
                .await
            {
                Ok(questions) => questions,
                Err(e) => {
                    tracing::warn!(variation_id = %variation.id, error = %e, "variation incomplete, removing it");
                    if let Err(cleanup) = self.store.delete_variation(variation.id).await {
                        tracing::error!(variation_id = %variation.id, error = %cleanup, "failed to remove incomplete variation");
                    }
                    return Err(e);
                }
            };

            tracing::info!(
                %exam_id,
                variation_id = %variation.id,
                variation_number = variation.variation_number,
                questions = questions.len(),
                "variation generated"
            );
            generated.push(GeneratedVariation {
                variation,
                questions,
            });
        }

        Ok(generated)
    }

    /// Creates the variation's rows and, when asked, shuffles each one. Any
    /// failure leaves the caller to remove the variation.
    async fn populate_variation(
        &self,
        variation: &ExamVariation,
        order: &[QuestionSelection],
        shuffle_alternatives: bool,
    ) -> Result<Vec<ExamQuestion>> {
        let rows = self
            .exam_questions
            .bulk_create_for_variation(variation.id, variation.exam_id, order)
            .await?;

        if !shuffle_alternatives {
            return self
                .exam_questions
                .find_by_variation(variation.id, &Default::default())
                .await;
        }

        let mut shuffled = Vec::with_capacity(rows.len());
        for row in &rows {
            shuffled.push(self.exam_questions.shuffle_and_store(row.id).await?);
        }
        Ok(shuffled)
    }

    /// Loads the picked questions so every selection carries the question's
    /// default points next to the exam override.
    async fn resolve_selections(
        &self,
        payload: &GenerateVariationsRequest,
    ) -> Result<Vec<QuestionSelection>> {
        let ids: Vec<Uuid> = payload.questions.iter().map(|p| p.question_id).collect();
        let unique: HashSet<&Uuid> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(Error::BadRequest(
                "a question can appear only once per variation".to_string(),
            ));
        }

        let found: HashMap<Uuid, Question> = self
            .store
            .get_questions(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        payload
            .questions
            .iter()
            .map(|pick| {
                let question = found.get(&pick.question_id).ok_or_else(|| {
                    Error::NotFound(format!("question {} not found", pick.question_id))
                })?;
                Ok(QuestionSelection {
                    question_id: pick.question_id,
                    points: Some(question.points),
                    exam_points: pick.exam_points,
                })
            })
            .collect()
    }
}
