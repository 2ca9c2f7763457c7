//! Deterministic quiz scoring.
//!
//! A question earns its full point value when the option chosen for it is
//! flagged correct, and nothing otherwise. Answers naming unknown questions
//! or options are ignored, and only the first recognised answer per question
//! counts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use lms_core::{OptionId, QuestionId};

use crate::Quiz;

/// One submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    #[serde(alias = "selectedOptionId")]
    pub option_id: OptionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    pub score: i64,
    pub total_points: i64,
    /// Percentage of total points, rounded to two decimals.
    pub percentage: f64,
    pub passed: bool,
}

pub fn score_attempt(quiz: &Quiz, answers: &[Answer]) -> ScoreOutcome {
    let total_points = quiz.total_points();
    let mut answered = HashSet::new();
    let mut score = 0i64;

    for answer in answers {
        let Some(question) = quiz.questions.iter().find(|q| q.id == answer.question_id) else {
            continue;
        };
        let Some(option) = question.options.iter().find(|o| o.id == answer.option_id) else {
            continue;
        };
        // Only a recognised answer claims its question.
        if !answered.insert(question.id) {
            continue;
        }
        if option.is_correct {
            score += i64::from(question.points);
        }
    }

    let raw = if total_points > 0 {
        score as f64 / total_points as f64 * 100.0
    } else {
        0.0
    };

    ScoreOutcome {
        score,
        total_points,
        percentage: (raw * 100.0).round() / 100.0,
        passed: raw >= f64::from(quiz.pass_mark),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lms_core::CourseId;
    use proptest::prelude::*;

    use super::*;
    use crate::{NewOption, NewQuestion, NewQuiz, QuizParent};

    fn quiz(pass_mark: i32, points: &[i32]) -> Quiz {
        let mut quiz = NewQuiz::parse("Quiz", Some(pass_mark), QuizParent::Course(CourseId::new()))
            .unwrap()
            .into_quiz(Utc::now());
        for (pos, p) in points.iter().enumerate() {
            let options = vec![
                NewOption { text: "right".into(), is_correct: true },
                NewOption { text: "wrong".into(), is_correct: false },
            ];
            let q = NewQuestion::parse("Question", None, Some(*p), options)
                .unwrap()
                .into_question(quiz.id, pos as i32);
            quiz.questions.push(q);
        }
        quiz
    }

    fn pick(quiz: &Quiz, idx: usize, correct: bool) -> Answer {
        let q = &quiz.questions[idx];
        let option = q.options.iter().find(|o| o.is_correct == correct).unwrap();
        Answer { question_id: q.id, option_id: option.id }
    }

    #[test]
    fn weighted_questions_score_by_points() {
        let quiz = quiz(50, &[1, 2]);
        let outcome = score_attempt(&quiz, &[pick(&quiz, 0, false), pick(&quiz, 1, true)]);
        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.total_points, 3);
        assert_eq!(outcome.percentage, 66.67);
        assert!(outcome.passed);
    }

    #[test]
    fn empty_submission_scores_zero() {
        let quiz = quiz(50, &[1, 2]);
        let outcome = score_attempt(&quiz, &[]);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.passed);
    }

    #[test]
    fn quiz_without_questions_is_zero_percent() {
        let quiz = quiz(30, &[]);
        let outcome = score_attempt(&quiz, &[]);
        assert_eq!(outcome.total_points, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.passed);
    }

    #[test]
    fn zero_pass_mark_passes_empty_quiz() {
        let quiz = quiz(0, &[]);
        assert!(score_attempt(&quiz, &[]).passed);
    }

    #[test]
    fn unknown_questions_and_options_are_ignored() {
        let quiz = quiz(30, &[1]);
        let answers = [
            Answer { question_id: QuestionId::new(), option_id: OptionId::new() },
            Answer { question_id: quiz.questions[0].id, option_id: OptionId::new() },
        ];
        let outcome = score_attempt(&quiz, &answers);
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn repeated_answers_count_once() {
        let quiz = quiz(30, &[1, 1]);
        let right = pick(&quiz, 0, true);
        let outcome = score_attempt(&quiz, &[right, right, right]);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.percentage, 50.0);
    }

    #[test]
    fn unknown_option_does_not_use_up_the_question() {
        let quiz = quiz(50, &[1]);
        let stray = Answer { question_id: quiz.questions[0].id, option_id: OptionId::new() };
        let outcome = score_attempt(&quiz, &[stray, pick(&quiz, 0, true)]);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.percentage, 100.0);
        assert!(outcome.passed);
    }

    #[test]
    fn option_from_another_question_is_skipped() {
        let quiz = quiz(50, &[1, 1]);
        let borrowed = Answer {
            question_id: quiz.questions[0].id,
            option_id: pick(&quiz, 1, true).option_id,
        };
        let outcome = score_attempt(&quiz, &[borrowed, pick(&quiz, 0, true)]);
        assert_eq!(outcome.score, 1);
    }

    #[test]
    fn answer_accepts_selected_option_alias() {
        let q = QuestionId::new();
        let o = OptionId::new();
        let json = format!(r#"{{"questionId":"{q}","selectedOptionId":"{o}"}}"#);
        let a: Answer = serde_json::from_str(&json).unwrap();
        assert_eq!(a.option_id, o);
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_pass_is_consistent(
            points in proptest::collection::vec(1i32..10, 0..8),
            picks in proptest::collection::vec(any::<bool>(), 0..8),
            pass_mark in 0i32..=100,
        ) {
            let quiz = quiz(pass_mark, &points);
            let answers: Vec<Answer> = picks
                .iter()
                .enumerate()
                .filter(|(i, _)| *i < quiz.questions.len())
                .map(|(i, c)| pick(&quiz, i, *c))
                .collect();
            let outcome = score_attempt(&quiz, &answers);
            prop_assert!(outcome.score >= 0);
            prop_assert!(outcome.score <= outcome.total_points);
            prop_assert!((0.0..=100.0).contains(&outcome.percentage));
            let raw = if outcome.total_points > 0 {
                outcome.score as f64 / outcome.total_points as f64 * 100.0
            } else {
                0.0
            };
            prop_assert_eq!(outcome.passed, raw >= pass_mark as f64);
        }
    }
}
