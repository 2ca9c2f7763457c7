//! `lms-quizzes` — quiz definitions, attempts and deterministic scoring.

pub mod attempt;
pub mod quiz;
pub mod scoring;

pub use attempt::QuizAttempt;
pub use quiz::{
    DEFAULT_PASS_MARK, NewOption, NewQuestion, NewQuiz, OptionView, Question, QuestionOption,
    QuestionType, QuestionView, Quiz, QuizParent, QuizSummary, QuizView,
};
pub use scoring::{Answer, ScoreOutcome, score_attempt};
