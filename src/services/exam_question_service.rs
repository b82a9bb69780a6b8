use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::database::store::ExamStore;
use crate::error::Result;
use crate::models::exam_question::{
    DifficultyBreakdown, ExamQuestion, FindOptions, NewExamQuestion, QuestionSelection,
};
use crate::services::grading_service::{
    AnswerCheck, GradingService, SubmissionResult, SubmittedAnswer,
};
use crate::services::shuffle_service::{shuffle_exam_question, ShuffleRng};

#[derive(Clone)]
pub struct ExamQuestionService {
    store: Arc<dyn ExamStore>,
    rng: ShuffleRng,
}

impl ExamQuestionService {
    pub fn new(store: Arc<dyn ExamStore>, rng: ShuffleRng) -> Self {
        Self { store, rng }
    }

    /// Loads the row with its question, shuffles the alternatives and
    /// persists the result. Reshuffling overwrites the previous state.
    pub async fn shuffle_and_store(&self, exam_question_id: Uuid) -> Result<ExamQuestion> {
        let row = self.store.get_exam_question(exam_question_id).await?;
        self.shuffle_row(&row).await
    }

    /// Shuffles an already loaded row. Fails with `UnloadedDependency` when
    /// the row's question was not joined, and with `Conflict` when another
    /// writer reshuffled it since it was read.
    pub async fn shuffle_row(&self, row: &ExamQuestion) -> Result<ExamQuestion> {
        let shuffled = self.rng.with(|rng| shuffle_exam_question(row, rng))?;
        let updated = self
            .store
            .update_shuffle(row.id, row.version, &shuffled)
            .await?;
        tracing::info!(
            exam_question_id = %row.id,
            variation_id = %row.variation_id,
            correct_answer = shuffled.correct_answer,
            original_correct_answer = shuffled.original_correct_answer,
            version = updated.version,
            "alternatives shuffled"
        );
        Ok(updated)
    }

    pub async fn check_answer(
        &self,
        exam_question_id: Uuid,
        submitted: &JsonValue,
    ) -> Result<AnswerCheck> {
        let row = self.store.get_exam_question(exam_question_id).await?;
        GradingService::check_answer(&row, submitted)
    }

    pub async fn find_by_variation(
        &self,
        variation_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        self.store.find_by_variation(variation_id, options).await
    }

    pub async fn find_by_exam(
        &self,
        exam_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        self.store.find_by_exam(exam_id, options).await
    }

    /// Creates one row per selection, `question_order` following input order
    /// and points resolved as `exam_points`, then `points`, then 1.0.
    /// Duplicate questions fail the whole batch at the store.
    pub async fn bulk_create_for_variation(
        &self,
        variation_id: Uuid,
        exam_id: Uuid,
        selections: &[QuestionSelection],
    ) -> Result<Vec<ExamQuestion>> {
        let rows: Vec<NewExamQuestion> = selections
            .iter()
            .enumerate()
            .map(|(idx, selection)| NewExamQuestion {
                exam_id,
                variation_id,
                question_id: selection.question_id,
                question_order: idx as i32,
                points: selection.resolved_points(),
                metadata: json!({}),
            })
            .collect();

        let created = self.store.bulk_insert_exam_questions(rows).await?;
        tracing::debug!(%variation_id, %exam_id, count = created.len(), "variation rows created");
        Ok(created)
    }

    /// Easy/medium/hard counts and summed exam points for one variation.
    pub async fn get_questions_by_difficulty(
        &self,
        variation_id: Uuid,
    ) -> Result<DifficultyBreakdown> {
        let rows = self
            .find_by_variation(variation_id, &FindOptions::default())
            .await?;

        let mut breakdown = DifficultyBreakdown::default();
        for row in &rows {
            breakdown.record(row.loaded_question()?.difficulty, row.points);
        }
        Ok(breakdown)
    }

    pub async fn grade_submission(
        &self,
        variation_id: Uuid,
        answers: &[SubmittedAnswer],
    ) -> Result<SubmissionResult> {
        self.store.get_variation(variation_id).await?;
        let rows = self
            .find_by_variation(variation_id, &FindOptions::default())
            .await?;
        let result = GradingService::grade_submission(&rows, answers)?;
        tracing::info!(
            %variation_id,
            score = %result.score,
            max_score = %result.max_score,
            "submission graded"
        );
        Ok(result)
    }
}
