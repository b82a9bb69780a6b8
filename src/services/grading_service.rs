use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam_question::ExamQuestion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub is_correct: bool,
    pub points: Decimal,
    pub correct_answer: i32,
    pub max_points: Decimal,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub exam_question_id: Uuid,
    /// `None` or `null` means the student left the question blank.
    #[serde(default)]
    pub answer: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub exam_question_id: Uuid,
    pub question_order: i32,
    pub answered: bool,
    pub submitted: Option<i64>,
    #[serde(flatten)]
    pub check: AnswerCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub score: Decimal,
    pub max_score: Decimal,
    pub percentage: Decimal,
    pub results: Vec<QuestionResult>,
}

/// Reads a submitted alternative index. Accepts a JSON integer or a string
/// holding one; anything else is an `InvalidAnswer`.
pub fn parse_submitted_answer(value: &JsonValue) -> Result<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::InvalidAnswer(format!("{} is not an alternative index", n))),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::InvalidAnswer(format!("{:?} is not an alternative index", s))),
        other => Err(Error::InvalidAnswer(format!(
            "{} is not an alternative index",
            other
        ))),
    }
}

pub struct GradingService;

impl GradingService {
    /// Grades one answer against the row's key. All or nothing.
    pub fn check_answer(row: &ExamQuestion, submitted: &JsonValue) -> Result<AnswerCheck> {
        let given = parse_submitted_answer(submitted)?;
        Self::check_index(row, Some(given))
    }

    fn check_index(row: &ExamQuestion, given: Option<i64>) -> Result<AnswerCheck> {
        let correct_answer = row.correct_answer()?;
        let is_correct = given == Some(i64::from(correct_answer));
        let max_points = row.points;

        Ok(AnswerCheck {
            is_correct,
            points: if is_correct { max_points } else { Decimal::ZERO },
            correct_answer,
            max_points,
            explanation: row.question.as_ref().and_then(|q| q.explanation.clone()),
        })
    }

    /// Grades a whole submission for the given rows of one variation. Rows
    /// without an answer score zero; answers for rows outside `rows` are
    /// rejected.
    pub fn grade_submission(
        rows: &[ExamQuestion],
        answers: &[SubmittedAnswer],
    ) -> Result<SubmissionResult> {
        let mut by_row: HashMap<Uuid, Option<&JsonValue>> = HashMap::new();
        for ans in answers {
            if !rows.iter().any(|r| r.id == ans.exam_question_id) {
                return Err(Error::BadRequest(format!(
                    "exam question {} is not part of this variation",
                    ans.exam_question_id
                )));
            }
            let value = ans.answer.as_ref().filter(|v| !v.is_null());
            if by_row.insert(ans.exam_question_id, value).is_some() {
                return Err(Error::BadRequest(format!(
                    "exam question {} answered more than once",
                    ans.exam_question_id
                )));
            }
        }

        let mut score = Decimal::ZERO;
        let mut max_score = Decimal::ZERO;
        let mut results = Vec::with_capacity(rows.len());

        for row in rows {
            let submitted = match by_row.get(&row.id).copied().flatten() {
                Some(value) => Some(parse_submitted_answer(value)?),
                None => None,
            };
            let check = Self::check_index(row, submitted)?;
            score += check.points;
            max_score += check.max_points;
            results.push(QuestionResult {
                exam_question_id: row.id,
                question_order: row.question_order,
                answered: submitted.is_some(),
                submitted,
                check,
            });
        }

        let percentage = if max_score.is_zero() {
            Decimal::ZERO
        } else {
            (score / max_score * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Ok(SubmissionResult {
            score,
            max_score,
            percentage,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam_question::{ShuffleState, ShuffledAlternatives};
    use crate::models::question::{Difficulty, Question};
    use crate::utils::time::now;
    use serde_json::json;
    use sqlx::types::Json;

    fn capitals() -> Question {
        Question {
            id: Uuid::new_v4(),
            statement: "Capital of France?".into(),
            alternatives: Json(vec![
                "Paris".into(),
                "London".into(),
                "Berlin".into(),
                "Rome".into(),
            ]),
            correct_answer: 0,
            difficulty: Difficulty::Easy,
            points: Decimal::ONE,
            explanation: Some("Paris.".into()),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn row(points: Decimal, shuffle: ShuffleState) -> ExamQuestion {
        let q = capitals();
        ExamQuestion {
            id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            variation_id: Uuid::new_v4(),
            question_id: q.id,
            question_order: 0,
            shuffled_alternatives: shuffle,
            points,
            metadata: json!({}),
            version: 0,
            created_at: now(),
            updated_at: now(),
            question: Some(q),
            variation: None,
        }
    }

    fn berlin_first() -> ShuffleState {
        ShuffleState::Shuffled(ShuffledAlternatives {
            alternatives: vec![
                "Berlin".into(),
                "Paris".into(),
                "Rome".into(),
                "London".into(),
            ],
            correct_answer: 1,
            original_correct_answer: 0,
            shuffled_at: now(),
        })
    }

    #[test]
    fn shuffled_key_is_used() {
        let r = row(Decimal::new(25, 1), berlin_first());

        let hit = GradingService::check_answer(&r, &json!(1)).unwrap();
        assert!(hit.is_correct);
        assert_eq!(hit.points, Decimal::new(25, 1));
        assert_eq!(hit.max_points, Decimal::new(25, 1));
        assert_eq!(hit.correct_answer, 1);
        assert_eq!(hit.explanation.as_deref(), Some("Paris."));

        let miss = GradingService::check_answer(&r, &json!(0)).unwrap();
        assert!(!miss.is_correct);
        assert_eq!(miss.points, Decimal::ZERO);
        assert_eq!(miss.correct_answer, 1);
    }

    #[test]
    fn unshuffled_row_falls_back_to_question_key() {
        let r = row(Decimal::ONE, ShuffleState::NotShuffled);
        assert!(GradingService::check_answer(&r, &json!(0)).unwrap().is_correct);
        assert!(!GradingService::check_answer(&r, &json!(1)).unwrap().is_correct);
    }

    #[test]
    fn unshuffled_row_without_question_cannot_be_graded() {
        let mut r = row(Decimal::ONE, ShuffleState::NotShuffled);
        r.question = None;
        assert!(matches!(
            GradingService::check_answer(&r, &json!(0)),
            Err(Error::UnloadedDependency(_))
        ));
    }

    #[test]
    fn string_indices_are_accepted() {
        let r = row(Decimal::ONE, berlin_first());
        assert!(GradingService::check_answer(&r, &json!(" 1 ")).unwrap().is_correct);
        assert!(!GradingService::check_answer(&r, &json!("2")).unwrap().is_correct);
    }

    #[test]
    fn non_integer_answers_are_rejected() {
        let r = row(Decimal::ONE, berlin_first());
        for bad in [json!("abc"), json!(1.5), json!(true), json!([1]), json!(null)] {
            assert!(
                matches!(
                    GradingService::check_answer(&r, &bad),
                    Err(Error::InvalidAnswer(_))
                ),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn submission_scores_blank_answers_as_zero() {
        let a = row(Decimal::new(2, 0), berlin_first());
        let mut b = row(Decimal::ONE, ShuffleState::NotShuffled);
        b.question_order = 1;
        let mut c = row(Decimal::ONE, ShuffleState::NotShuffled);
        c.question_order = 2;
        let rows = vec![a.clone(), b.clone(), c.clone()];

        let answers = vec![
            SubmittedAnswer {
                exam_question_id: a.id,
                answer: Some(json!(1)),
            },
            SubmittedAnswer {
                exam_question_id: b.id,
                answer: Some(json!("3")),
            },
            SubmittedAnswer {
                exam_question_id: c.id,
                answer: Some(JsonValue::Null),
            },
        ];

        let result = GradingService::grade_submission(&rows, &answers).unwrap();
        assert_eq!(result.score, Decimal::new(2, 0));
        assert_eq!(result.max_score, Decimal::new(4, 0));
        assert_eq!(result.percentage, Decimal::new(50, 0));
        assert_eq!(result.results.len(), 3);
        assert!(result.results[0].check.is_correct);
        assert!(!result.results[1].check.is_correct);
        assert!(!result.results[2].answered);
    }

    #[test]
    fn submission_rejects_foreign_and_duplicate_rows() {
        let a = row(Decimal::ONE, berlin_first());
        let rows = vec![a.clone()];

        let foreign = vec![SubmittedAnswer {
            exam_question_id: Uuid::new_v4(),
            answer: Some(json!(0)),
        }];
        assert!(matches!(
            GradingService::grade_submission(&rows, &foreign),
            Err(Error::BadRequest(_))
        ));

        let twice = vec![
            SubmittedAnswer {
                exam_question_id: a.id,
                answer: Some(json!(0)),
            },
            SubmittedAnswer {
                exam_question_id: a.id,
                answer: Some(json!(1)),
            },
        ];
        assert!(matches!(
            GradingService::grade_submission(&rows, &twice),
            Err(Error::BadRequest(_))
        ));
    }
}
