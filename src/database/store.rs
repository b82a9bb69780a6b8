use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::exam::{Exam, ExamVariation, NewExam};
use crate::models::exam_question::{
    ExamQuestion, FindOptions, NewExamQuestion, ShuffledAlternatives,
};
use crate::models::question::{Difficulty, NewQuestion, Question};

/// Persistence seam for questions, exams, variations and their rows.
///
/// Implementations enforce the same rules: unique `(variation_id,
/// question_id)` and `(variation_id, question_order)`, points within
/// [0.1, 100.0], cascading deletes from exams and variations, and an atomic
/// bulk insert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn insert_question(&self, new: NewQuestion) -> Result<Question>;

    async fn get_question(&self, id: Uuid) -> Result<Question>;

    /// Questions with the given ids, in no particular order. Unknown ids are
    /// skipped.
    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>>;

    async fn list_questions(&self, difficulty: Option<Difficulty>) -> Result<Vec<Question>>;

    async fn insert_exam(&self, new: NewExam) -> Result<Exam>;

    async fn get_exam(&self, id: Uuid) -> Result<Exam>;

    async fn delete_exam(&self, id: Uuid) -> Result<()>;

    /// Creates the exam's next variation (`max(variation_number) + 1`).
    async fn insert_variation(&self, exam_id: Uuid) -> Result<ExamVariation>;

    async fn get_variation(&self, id: Uuid) -> Result<ExamVariation>;

    async fn delete_variation(&self, id: Uuid) -> Result<()>;

    /// Inserts all rows or none. Returns them in input order.
    async fn bulk_insert_exam_questions(
        &self,
        rows: Vec<NewExamQuestion>,
    ) -> Result<Vec<ExamQuestion>>;

    /// One row with its question joined.
    async fn get_exam_question(&self, id: Uuid) -> Result<ExamQuestion>;

    /// Rows of a variation by `question_order`, questions joined.
    async fn find_by_variation(
        &self,
        variation_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>>;

    /// Rows of an exam by variation number then `question_order`, questions
    /// and variation summaries joined.
    async fn find_by_exam(&self, exam_id: Uuid, options: &FindOptions)
        -> Result<Vec<ExamQuestion>>;

    /// Writes a new shuffle state if the row is still at `expected_version`.
    /// A stale version is a `Conflict`.
    async fn update_shuffle(
        &self,
        id: Uuid,
        expected_version: i32,
        shuffled: &ShuffledAlternatives,
    ) -> Result<ExamQuestion>;
}
