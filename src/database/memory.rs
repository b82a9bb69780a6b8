use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::store::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::{Exam, ExamVariation, NewExam, VariationSummary};
use crate::models::exam_question::{
    validate_points, ExamQuestion, FindOptions, NewExamQuestion, ShuffleState,
    ShuffledAlternatives,
};
use crate::models::question::{Difficulty, NewQuestion, Question};
use crate::utils::time::now;

#[derive(Default)]
struct Tables {
    questions: HashMap<Uuid, Question>,
    exams: HashMap<Uuid, Exam>,
    variations: HashMap<Uuid, ExamVariation>,
    exam_questions: HashMap<Uuid, ExamQuestion>,
}

impl Tables {
    fn with_question(&self, row: &ExamQuestion) -> ExamQuestion {
        let mut row = row.clone();
        row.question = self.questions.get(&row.question_id).cloned();
        row
    }

    fn matches(&self, row: &ExamQuestion, options: &FindOptions) -> bool {
        match options.difficulty {
            None => true,
            Some(wanted) => self
                .questions
                .get(&row.question_id)
                .map(|q| q.difficulty == wanted)
                .unwrap_or(false),
        }
    }
}

/// Applies `offset`/`limit`; callers have already run `check_paging`.
fn page<T>(items: Vec<T>, options: &FindOptions) -> Vec<T> {
    let offset = options.offset.unwrap_or(0) as usize;
    let limit = options.limit.map_or(usize::MAX, |l| l as usize);
    items.into_iter().skip(offset).take(limit).collect()
}

/// Store backed by process memory. Used when no database is configured and
/// by the test suite; enforces the same constraints as the SQL schema.
#[derive(Clone, Default)]
pub struct MemoryExamStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn insert_question(&self, new: NewQuestion) -> Result<Question> {
        validate_points(new.points)?;
        if new.correct_answer < 0 {
            return Err(Error::BadRequest(
                "correct_answer must be non-negative".to_string(),
            ));
        }
        let ts = now();
        let question = Question {
            id: Uuid::new_v4(),
            statement: new.statement,
            alternatives: Json(new.alternatives),
            correct_answer: new.correct_answer,
            difficulty: new.difficulty,
            points: new.points,
            explanation: new.explanation,
            created_at: ts,
            updated_at: ts,
        };
        let mut tables = self.tables.write().await;
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        let tables = self.tables.read().await;
        tables
            .questions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("question {} not found", id)))
    }

    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let tables = self.tables.read().await;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| tables.questions.get(id).cloned())
            .collect())
    }

    async fn list_questions(&self, difficulty: Option<Difficulty>) -> Result<Vec<Question>> {
        let tables = self.tables.read().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| difficulty.map(|d| q.difficulty == d).unwrap_or(true))
            .cloned()
            .collect();
        questions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(questions)
    }

    async fn insert_exam(&self, new: NewExam) -> Result<Exam> {
        let ts = now();
        let exam = Exam {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            created_at: ts,
            updated_at: ts,
        };
        let mut tables = self.tables.write().await;
        tables.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn get_exam(&self, id: Uuid) -> Result<Exam> {
        let tables = self.tables.read().await;
        tables
            .exams
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("exam {} not found", id)))
    }

    async fn delete_exam(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.exams.remove(&id).is_none() {
            return Err(Error::NotFound(format!("exam {} not found", id)));
        }
        tables.variations.retain(|_, v| v.exam_id != id);
        tables.exam_questions.retain(|_, r| r.exam_id != id);
        Ok(())
    }

    async fn insert_variation(&self, exam_id: Uuid) -> Result<ExamVariation> {
        let mut tables = self.tables.write().await;
        if !tables.exams.contains_key(&exam_id) {
            return Err(Error::NotFound(format!("exam {} not found", exam_id)));
        }
        let next = tables
            .variations
            .values()
            .filter(|v| v.exam_id == exam_id)
            .map(|v| v.variation_number)
            .max()
            .unwrap_or(0)
            + 1;
        let variation = ExamVariation {
            id: Uuid::new_v4(),
            exam_id,
            variation_number: next,
            created_at: now(),
        };
        tables.variations.insert(variation.id, variation.clone());
        Ok(variation)
    }

    async fn get_variation(&self, id: Uuid) -> Result<ExamVariation> {
        let tables = self.tables.read().await;
        tables
            .variations
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("variation {} not found", id)))
    }

    async fn delete_variation(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.variations.remove(&id).is_none() {
            return Err(Error::NotFound(format!("variation {} not found", id)));
        }
        tables.exam_questions.retain(|_, r| r.variation_id != id);
        Ok(())
    }

    async fn bulk_insert_exam_questions(
        &self,
        rows: Vec<NewExamQuestion>,
    ) -> Result<Vec<ExamQuestion>> {
        let mut tables = self.tables.write().await;

        // Validate the whole batch before touching the table.
        let mut taken_questions: HashSet<(Uuid, Uuid)> = tables
            .exam_questions
            .values()
            .map(|r| (r.variation_id, r.question_id))
            .collect();
        let mut taken_orders: HashSet<(Uuid, i32)> = tables
            .exam_questions
            .values()
            .map(|r| (r.variation_id, r.question_order))
            .collect();

        for row in &rows {
            if !tables.exams.contains_key(&row.exam_id) {
                return Err(Error::NotFound(format!("exam {} not found", row.exam_id)));
            }
            let variation = tables.variations.get(&row.variation_id).ok_or_else(|| {
                Error::NotFound(format!("variation {} not found", row.variation_id))
            })?;
            if variation.exam_id != row.exam_id {
                return Err(Error::BadRequest(format!(
                    "variation {} does not belong to exam {}",
                    row.variation_id, row.exam_id
                )));
            }
            if !tables.questions.contains_key(&row.question_id) {
                return Err(Error::NotFound(format!(
                    "question {} not found",
                    row.question_id
                )));
            }
            if row.question_order < 0 {
                return Err(Error::BadRequest(
                    "question_order must be non-negative".to_string(),
                ));
            }
            validate_points(row.points)?;
            if !taken_questions.insert((row.variation_id, row.question_id)) {
                return Err(Error::Conflict(format!(
                    "question {} already appears in variation {}",
                    row.question_id, row.variation_id
                )));
            }
            if !taken_orders.insert((row.variation_id, row.question_order)) {
                return Err(Error::Conflict(format!(
                    "position {} already taken in variation {}",
                    row.question_order, row.variation_id
                )));
            }
        }

        let ts = now();
        let created: Vec<ExamQuestion> = rows
            .into_iter()
            .map(|row| ExamQuestion {
                id: Uuid::new_v4(),
                exam_id: row.exam_id,
                variation_id: row.variation_id,
                question_id: row.question_id,
                question_order: row.question_order,
                shuffled_alternatives: ShuffleState::NotShuffled,
                points: row.points,
                metadata: if row.metadata.is_null() {
                    json!({})
                } else {
                    row.metadata
                },
                version: 0,
                created_at: ts,
                updated_at: ts,
                question: None,
                variation: None,
            })
            .collect();

        for row in &created {
            tables.exam_questions.insert(row.id, row.clone());
        }
        Ok(created)
    }

    async fn get_exam_question(&self, id: Uuid) -> Result<ExamQuestion> {
        let tables = self.tables.read().await;
        tables
            .exam_questions
            .get(&id)
            .map(|row| tables.with_question(row))
            .ok_or_else(|| Error::NotFound(format!("exam question {} not found", id)))
    }

    async fn find_by_variation(
        &self,
        variation_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        options.check_paging()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<ExamQuestion> = tables
            .exam_questions
            .values()
            .filter(|r| r.variation_id == variation_id && tables.matches(r, options))
            .map(|r| tables.with_question(r))
            .collect();
        rows.sort_by_key(|r| r.question_order);
        Ok(page(rows, options))
    }

    async fn find_by_exam(
        &self,
        exam_id: Uuid,
        options: &FindOptions,
    ) -> Result<Vec<ExamQuestion>> {
        options.check_paging()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<ExamQuestion> = tables
            .exam_questions
            .values()
            .filter(|r| r.exam_id == exam_id && tables.matches(r, options))
            .map(|r| {
                let mut row = tables.with_question(r);
                row.variation = tables
                    .variations
                    .get(&row.variation_id)
                    .map(VariationSummary::from);
                row
            })
            .collect();
        rows.sort_by_key(|r| {
            (
                r.variation.as_ref().map(|v| v.variation_number).unwrap_or(i32::MAX),
                r.question_order,
            )
        });
        Ok(page(rows, options))
    }

    async fn update_shuffle(
        &self,
        id: Uuid,
        expected_version: i32,
        shuffled: &ShuffledAlternatives,
    ) -> Result<ExamQuestion> {
        let mut tables = self.tables.write().await;
        let row = tables
            .exam_questions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("exam question {} not found", id)))?;
        if row.version != expected_version {
            return Err(Error::Conflict(format!(
                "exam question {} was reshuffled concurrently",
                id
            )));
        }
        row.shuffled_alternatives = ShuffleState::Shuffled(shuffled.clone());
        row.version += 1;
        row.updated_at = now();
        let row = row.clone();
        Ok(tables.with_question(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    async fn seeded() -> (MemoryExamStore, Exam, ExamVariation, Vec<Question>) {
        let store = MemoryExamStore::new();
        let mut questions = vec![];
        for (i, difficulty) in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
            .into_iter()
            .enumerate()
        {
            questions.push(
                store
                    .insert_question(NewQuestion {
                        statement: format!("Q{}", i),
                        alternatives: vec!["a".into(), "b".into()],
                        correct_answer: 0,
                        difficulty,
                        points: Decimal::ONE,
                        explanation: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let exam = store
            .insert_exam(NewExam {
                title: "Midterm".into(),
                description: None,
            })
            .await
            .unwrap();
        let variation = store.insert_variation(exam.id).await.unwrap();
        (store, exam, variation, questions)
    }

    fn new_row(exam: &Exam, variation: &ExamVariation, question: &Question, order: i32) -> NewExamQuestion {
        NewExamQuestion {
            exam_id: exam.id,
            variation_id: variation.id,
            question_id: question.id,
            question_order: order,
            points: Decimal::ONE,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn variation_numbers_are_sequential_per_exam() {
        let (store, exam, first, _) = seeded().await;
        let second = store.insert_variation(exam.id).await.unwrap();
        assert_eq!(first.variation_number, 1);
        assert_eq!(second.variation_number, 2);
    }

    #[tokio::test]
    async fn duplicate_order_fails_the_whole_batch() {
        let (store, exam, variation, qs) = seeded().await;
        let rows = vec![
            new_row(&exam, &variation, &qs[0], 0),
            new_row(&exam, &variation, &qs[1], 0),
        ];
        let err = store.bulk_insert_exam_questions(rows).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let left = store
            .find_by_variation(variation.id, &FindOptions::default())
            .await
            .unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_variation_cascades() {
        let (store, exam, variation, qs) = seeded().await;
        store
            .bulk_insert_exam_questions(vec![new_row(&exam, &variation, &qs[0], 0)])
            .await
            .unwrap();
        store.delete_variation(variation.id).await.unwrap();
        let rows = store
            .find_by_exam(exam.id, &FindOptions::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let (store, exam, variation, qs) = seeded().await;
        let created = store
            .bulk_insert_exam_questions(vec![new_row(&exam, &variation, &qs[0], 0)])
            .await
            .unwrap();
        let shuffled = ShuffledAlternatives {
            alternatives: vec!["b".into(), "a".into()],
            correct_answer: 1,
            original_correct_answer: 0,
            shuffled_at: now(),
        };
        let updated = store
            .update_shuffle(created[0].id, 0, &shuffled)
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert!(updated.question.is_some());

        let err = store
            .update_shuffle(created[0].id, 0, &shuffled)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn difficulty_filter_and_paging() {
        let (store, exam, variation, qs) = seeded().await;
        let rows = qs
            .iter()
            .enumerate()
            .map(|(i, q)| new_row(&exam, &variation, q, i as i32))
            .collect();
        store.bulk_insert_exam_questions(rows).await.unwrap();

        let hard = store
            .find_by_variation(
                variation.id,
                &FindOptions {
                    difficulty: Some(Difficulty::Hard),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].question_order, 2);

        let paged = store
            .find_by_variation(
                variation.id,
                &FindOptions {
                    limit: Some(1),
                    offset: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].question_order, 1);
    }

    #[tokio::test]
    async fn negative_paging_is_a_bad_request() {
        let (store, exam, variation, _) = seeded().await;
        let negative_limit = FindOptions {
            limit: Some(-1),
            ..Default::default()
        };
        let err = store
            .find_by_variation(variation.id, &negative_limit)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let negative_offset = FindOptions {
            offset: Some(-3),
            ..Default::default()
        };
        let err = store
            .find_by_exam(exam.id, &negative_offset)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn rows_must_belong_to_the_variations_exam() {
        let (store, exam, variation, qs) = seeded().await;
        let other = store
            .insert_exam(NewExam {
                title: "Other".into(),
                description: None,
            })
            .await
            .unwrap();

        let mut row = new_row(&exam, &variation, &qs[0], 0);
        row.exam_id = other.id;
        let err = store
            .bulk_insert_exam_questions(vec![new_row(&exam, &variation, &qs[1], 1), row])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        for exam_id in [exam.id, other.id] {
            let rows = store
                .find_by_exam(exam_id, &FindOptions::default())
                .await
                .unwrap();
            assert!(rows.is_empty());
        }
    }
}
