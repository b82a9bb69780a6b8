use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::{Exam, ExamVariation, NewExam, VariationSummary};
use crate::models::exam_question::{
    ExamQuestion, FindOptions, NewExamQuestion, ShuffledAlternatives,
};
use crate::models::question::{Difficulty, NewQuestion, Question};

#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_questions(&self, rows: &mut [ExamQuestion]) -> Result<()> {
        let mut ids: Vec<Uuid> = rows.iter().map(|r| r.question_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let questions: HashMap<Uuid, Question> = self
            .get_questions(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        for row in rows.iter_mut() {
            row.question = questions.get(&row.question_id).cloned();
        }
        Ok(())
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn insert_question(&self, new: NewQuestion) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (id, statement, alternatives, correct_answer, difficulty, points, explanation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.statement)
        .bind(Json(&new.alternatives))
        .bind(new.correct_answer)
        .bind(new.difficulty.as_str())
        .bind(new.points)
        .bind(&new.explanation)
        .fetch_one(&self.pool)
        .await?;

        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(r#"SELECT * FROM questions WHERE id = $1"#)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(question)
    }

    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let questions =
            sqlx::query_as::<_, Question>(r#"SELECT * FROM questions WHERE id = ANY($1)"#)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(questions)
    }

    async fn list_questions(&self, difficulty: Option<Difficulty>) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE ($1::text IS NULL OR difficulty = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(difficulty.map(|d| d.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn insert_exam(&self, new: NewExam) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams (id, title, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(exam)
    }

    async fn get_exam(&self, id: Uuid) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exam)
    }

    async fn delete_exam(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM exams WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("exam {} not found", id)));
        }
        Ok(())
    }

    async fn insert_variation(&self, exam_id: Uuid) -> Result<ExamVariation> {
        let variation = sqlx::query_as::<_, ExamVariation>(
            r#"
            INSERT INTO exam_variations (id, exam_id, variation_number)
            SELECT $1, $2, COALESCE(MAX(variation_number), 0) + 1
            FROM exam_variations
            WHERE exam_id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(variation)
    }

    async fn get_variation(&self, id: Uuid) -> Result<ExamVariation> {
        let variation =
            sqlx::query_as::<_, ExamVariation>(r#"SELECT * FROM exam_variations WHERE id = $1"#)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(variation)
    }

    async fn delete_variation(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM exam_variations WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("variation {} not found", id)));
        }
        Ok(())
    }

    async fn bulk_insert_exam_questions(
        &self,
        rows: Vec<NewExamQuestion>,
    ) -> Result<Vec<ExamQuestion>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self.pool.begin().await?;

        let mut owners: HashMap<Uuid, Uuid> = HashMap::new();
        for row in &rows {
            if !owners.contains_key(&row.variation_id) {
                let owner: Option<Uuid> =
                    sqlx::query_scalar(r#"SELECT exam_id FROM exam_variations WHERE id = $1"#)
                        .bind(row.variation_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let owner = owner.ok_or_else(|| {
                    Error::NotFound(format!("variation {} not found", row.variation_id))
                })?;
                owners.insert(row.variation_id, owner);
            }
            if owners.get(&row.variation_id) != Some(&row.exam_id) {
                return Err(Error::BadRequest(format!(
                    "variation {} does not belong to exam {}",
                    row.variation_id, row.exam_id
                )));
            }
        }

        let mut created = Vec::with_capacity(rows.len());
        for row in rows {
            let inserted = sqlx::query_as::<_, ExamQuestion>(
                r#"
                INSERT INTO exam_questions (id, exam_id, variation_id, question_id, question_order, points, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.exam_id)
            .bind(row.variation_id)
            .bind(row.question_id)
            .bind(row.question_order)
            .bind(row.points)
            .bind(row.metadata)
            .fetch_one(&mut *tx)
            .await?;
            created.push(inserted);
        }
        tx.commit().await?;

        Ok(created)
    }

    async fn get_exam_question(&self, id: Uuid) -> Result<ExamQuestion> {
        let mut row =
            sqlx::query_as::<_, ExamQuestion>(r#"SELECT * FROM exam_questions WHERE id = $1"#)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        row.question = Some(self.get_question(row.question_id).await?);
        Ok(row)
    }

    async fn find_by_variation(
        &self,
        variation_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        options.check_paging()?;
        let mut rows = sqlx::query_as::<_, ExamQuestion>(
            r#"
            SELECT eq.*
            FROM exam_questions eq
            JOIN questions q ON q.id = eq.question_id
            WHERE eq.variation_id = $1
              AND ($2::text IS NULL OR q.difficulty = $2)
            ORDER BY eq.question_order ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(variation_id)
        .bind(options.difficulty.map(|d| d.as_str()))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(&self.pool)
        .await?;

        self.attach_questions(&mut rows).await?;
        Ok(rows)
    }

    async fn find_by_exam(
        &self,
        exam_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        options.check_paging()?;
        let mut rows = sqlx::query_as::<_, ExamQuestion>(
            r#"
            SELECT eq.*
            FROM exam_questions eq
            JOIN exam_variations v ON v.id = eq.variation_id
            JOIN questions q ON q.id = eq.question_id
            WHERE eq.exam_id = $1
              AND ($2::text IS NULL OR q.difficulty = $2)
            ORDER BY v.variation_number ASC, eq.question_order ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(exam_id)
        .bind(options.difficulty.map(|d| d.as_str()))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(&self.pool)
        .await?;

        let variations: HashMap<Uuid, VariationSummary> = sqlx::query_as::<_, VariationSummary>(
            r#"SELECT id, variation_number FROM exam_variations WHERE exam_id = $1"#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

        self.attach_questions(&mut rows).await?;
        for row in rows.iter_mut() {
            row.variation = variations.get(&row.variation_id).cloned();
        }
        Ok(rows)
    }

    async fn update_shuffle(
        &self,
        id: Uuid,
        expected_version: i32,
        shuffled: &ShuffledAlternatives,
    ) -> Result<ExamQuestion> {
        let updated = sqlx::query_as::<_, ExamQuestion>(
            r#"
            UPDATE exam_questions
            SET shuffled_alternatives = $3,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(Json(shuffled))
        .fetch_optional(&self.pool)
        .await?;

        let mut row = match updated {
            Some(row) => row,
            None => {
                let exists: bool = sqlx::query_scalar(
                    r#"SELECT EXISTS(SELECT 1 FROM exam_questions WHERE id = $1)"#,
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
                return Err(if exists {
                    Error::Conflict(format!(
                        "exam question {} was reshuffled concurrently",
                        id
                    ))
                } else {
                    Error::NotFound(format!("exam question {} not found", id))
                });
            }
        };

        row.question = Some(self.get_question(row.question_id).await?);
        Ok(row)
    }
}
