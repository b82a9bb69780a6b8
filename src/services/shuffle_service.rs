use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::models::exam_question::{ExamQuestion, ShuffledAlternatives};
use crate::models::question::Question;
use crate::utils::time::now;

/// Process-wide random source for shuffles. Seeded from config when a
/// deterministic sequence is wanted.
#[derive(Clone)]
pub struct ShuffleRng {
    inner: Arc<Mutex<StdRng>>,
}

impl ShuffleRng {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// Runs `f` with exclusive access to the generator. Keep `f` synchronous;
    /// the lock must not be held across an await point.
    pub fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

/// In-place Fisher-Yates: walk `i` from the last index down to 1 and swap it
/// with a uniformly drawn `j` in `[0, i]`.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Shuffles a question's alternatives and remaps its correct answer.
///
/// Alternatives are shuffled together with their canonical index, and the new
/// key is the position of the pair carrying the canonical correct index. Two
/// alternatives with identical text therefore never swap roles.
pub fn shuffle_alternatives<R: Rng + ?Sized>(
    question: &Question,
    rng: &mut R,
) -> Result<ShuffledAlternatives> {
    let original_correct = question.correct_answer;
    let correct_idx = usize::try_from(original_correct)
        .ok()
        .filter(|idx| *idx < question.alternatives.len())
        .ok_or_else(|| {
            Error::Internal(format!(
                "question {} has correct answer {} outside its {} alternatives",
                question.id,
                original_correct,
                question.alternatives.len()
            ))
        })?;

    let mut tagged: Vec<(usize, &str)> = question
        .alternatives
        .iter()
        .map(String::as_str)
        .enumerate()
        .collect();
    fisher_yates(&mut tagged, rng);

    let new_correct = tagged
        .iter()
        .position(|(orig, _)| *orig == correct_idx)
        .ok_or_else(|| Error::Internal("correct alternative lost during shuffle".to_string()))?;

    Ok(ShuffledAlternatives {
        alternatives: tagged.into_iter().map(|(_, text)| text.to_string()).collect(),
        correct_answer: new_correct as i32,
        original_correct_answer: original_correct,
        shuffled_at: now(),
    })
}

/// Shuffles the alternatives of a row's joined question.
pub fn shuffle_exam_question<R: Rng + ?Sized>(
    row: &ExamQuestion,
    rng: &mut R,
) -> Result<ShuffledAlternatives> {
    shuffle_alternatives(row.loaded_question()?, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Difficulty;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn question(alternatives: &[&str], correct: i32) -> Question {
        Question {
            id: Uuid::new_v4(),
            statement: "Capital of France?".into(),
            alternatives: Json(alternatives.iter().map(|s| s.to_string()).collect()),
            correct_answer: correct,
            difficulty: Difficulty::Easy,
            points: Decimal::ONE,
            explanation: Some("Paris has been the capital since 987.".into()),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn bare_row() -> ExamQuestion {
        ExamQuestion {
            id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            variation_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            question_order: 0,
            shuffled_alternatives: Default::default(),
            points: Decimal::ONE,
            metadata: json!({}),
            version: 0,
            created_at: now(),
            updated_at: now(),
            question: None,
            variation: None,
        }
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_alternatives() {
        let q = question(&["Paris", "London", "Berlin", "Rome", "Madrid"], 0);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_alternatives(&q, &mut rng).unwrap();

            assert_eq!(shuffled.alternatives.len(), q.alternatives.len());
            let mut got = shuffled.alternatives.clone();
            let mut want = q.alternatives.0.clone();
            got.sort();
            want.sort();
            assert_eq!(got, want, "seed {}", seed);
        }
    }

    #[test]
    fn correct_answer_follows_the_original_text() {
        let q = question(&["Paris", "London", "Berlin", "Rome"], 2);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_alternatives(&q, &mut rng).unwrap();
            assert_eq!(shuffled.original_correct_answer, 2);
            assert_eq!(
                shuffled.alternatives[shuffled.correct_answer as usize],
                "Berlin"
            );
        }
    }

    #[test]
    fn duplicate_texts_keep_the_key_on_the_tagged_alternative() {
        // Both "Yes" entries are textually identical; the key must still point
        // at a "Yes" and the count of each text must be preserved.
        let q = question(&["Yes", "No", "Yes"], 2);
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_alternatives(&q, &mut rng).unwrap();
            assert_eq!(shuffled.alternatives[shuffled.correct_answer as usize], "Yes");
            assert_eq!(
                shuffled.alternatives.iter().filter(|a| *a == "Yes").count(),
                2
            );
        }
    }

    #[test]
    fn tagged_shuffle_tracks_the_exact_element() {
        let mut items: Vec<(usize, &str)> = vec![(0, "a"), (1, "a"), (2, "a"), (3, "b")];
        let mut rng = StdRng::seed_from_u64(7);
        fisher_yates(&mut items, &mut rng);
        let pos = items.iter().position(|(i, _)| *i == 1).unwrap();
        assert_eq!(items[pos], (1, "a"));
        let mut idx: Vec<usize> = items.iter().map(|(i, _)| *i).collect();
        idx.sort();
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn same_seed_gives_same_order() {
        let q = question(&["a", "b", "c", "d", "e", "f"], 3);
        let first = ShuffleRng::seeded(42).with(|rng| shuffle_alternatives(&q, rng).unwrap());
        let second = ShuffleRng::seeded(42).with(|rng| shuffle_alternatives(&q, rng).unwrap());
        assert_eq!(first.alternatives, second.alternatives);
        assert_eq!(first.correct_answer, second.correct_answer);
    }

    #[test]
    fn fisher_yates_handles_tiny_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = vec![];
        fisher_yates(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![9];
        fisher_yates(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }

    #[test]
    fn out_of_range_key_is_rejected() {
        let q = question(&["a", "b"], 5);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            shuffle_alternatives(&q, &mut rng),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn row_without_question_is_an_unloaded_dependency() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = shuffle_exam_question(&bare_row(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::UnloadedDependency("question")));
    }
}
