use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{
    CourseId, DomainError, DomainResult, LessonId, ModuleId, OptionId, QuestionId, QuizId,
};

/// Pass threshold (percent) applied when none is given.
pub const DEFAULT_PASS_MARK: i32 = 30;

/// The single hierarchy node a quiz is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum QuizParent {
    Course(CourseId),
    Module(ModuleId),
    Lesson(LessonId),
}

impl QuizParent {
    /// Pick the most specific node among those given (lesson, then module,
    /// then course).
    pub fn most_specific(
        course: Option<CourseId>,
        module: Option<ModuleId>,
        lesson: Option<LessonId>,
    ) -> DomainResult<Self> {
        lesson
            .map(QuizParent::Lesson)
            .or(module.map(QuizParent::Module))
            .or(course.map(QuizParent::Course))
            .ok_or_else(|| {
                DomainError::validation("A quiz must be associated with a lesson, module or course")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
        }
    }
}

impl core::str::FromStr for QuestionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MULTIPLE_CHOICE" => Ok(QuestionType::MultipleChoice),
            "TRUE_FALSE" => Ok(QuestionType::TrueFalse),
            other => Err(DomainError::validation(format!("unknown question type '{other}'"))),
        }
    }
}

/// Author-facing option, correctness flag included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points: i32,
    pub position: i32,
    pub options: Vec<QuestionOption>,
}

/// A quiz with its ordered questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub pass_mark: i32,
    pub parent: QuizParent,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| i64::from(q.points)).sum()
    }

    /// Learner-facing view: options without their correctness flag.
    pub fn view(&self) -> QuizView {
        QuizView {
            id: self.id,
            title: self.title.clone(),
            pass_mark: self.pass_mark,
            parent: self.parent,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id,
                    text: q.text.clone(),
                    question_type: q.question_type,
                    points: q.points,
                    options: q
                        .options
                        .iter()
                        .map(|o| OptionView {
                            id: o.id,
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Metadata only, for readers without full access.
    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            pass_mark: self.pass_mark,
            parent: self.parent,
            question_count: self.questions.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: QuizId,
    pub title: String,
    pub pass_mark: i32,
    pub parent: QuizParent,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: QuizId,
    pub title: String,
    pub pass_mark: i32,
    pub parent: QuizParent,
    pub question_count: usize,
}

/// Validated input for a new (empty) quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuiz {
    pub title: String,
    pub pass_mark: i32,
    pub parent: QuizParent,
}

impl NewQuiz {
    pub fn parse(title: &str, pass_mark: Option<i32>, parent: QuizParent) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("A quiz must have a title"));
        }
        let pass_mark = pass_mark.unwrap_or(DEFAULT_PASS_MARK);
        if !(0..=100).contains(&pass_mark) {
            return Err(DomainError::validation("passMark must be between 0 and 100"));
        }
        Ok(Self {
            title: title.to_string(),
            pass_mark,
            parent,
        })
    }

    pub fn into_quiz(self, now: DateTime<Utc>) -> Quiz {
        Quiz {
            id: QuizId::new(),
            title: self.title,
            pass_mark: self.pass_mark,
            parent: self.parent,
            questions: Vec::new(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Validated input for a question appended to a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<NewOption>,
}

impl NewQuestion {
    pub fn parse(
        text: &str,
        question_type: Option<QuestionType>,
        points: Option<i32>,
        options: Vec<NewOption>,
    ) -> DomainResult<Self> {
        let text = text.trim();
        if text.is_empty() || options.len() < 2 {
            return Err(DomainError::validation(
                "A question must have text and at least 2 options.",
            ));
        }
        if options.iter().any(|o| o.text.trim().is_empty()) {
            return Err(DomainError::validation("Every option must have text"));
        }
        let points = points.unwrap_or(1);
        if points <= 0 {
            return Err(DomainError::validation("Question points must be positive"));
        }
        Ok(Self {
            text: text.to_string(),
            question_type: question_type.unwrap_or_default(),
            points,
            options,
        })
    }

    pub fn into_question(self, quiz_id: QuizId, position: i32) -> Question {
        Question {
            id: QuestionId::new(),
            quiz_id,
            text: self.text,
            question_type: self.question_type,
            points: self.points,
            position,
            options: self
                .options
                .into_iter()
                .map(|o| QuestionOption {
                    id: OptionId::new(),
                    text: o.text.trim().to_string(),
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(n: usize) -> Vec<NewOption> {
        (0..n)
            .map(|i| NewOption {
                text: format!("option {i}"),
                is_correct: i == 0,
            })
            .collect()
    }

    #[test]
    fn most_specific_parent_wins() {
        let c = CourseId::new();
        let m = ModuleId::new();
        let l = LessonId::new();
        assert_eq!(QuizParent::most_specific(Some(c), Some(m), Some(l)).unwrap(), QuizParent::Lesson(l));
        assert_eq!(QuizParent::most_specific(Some(c), Some(m), None).unwrap(), QuizParent::Module(m));
        assert_eq!(QuizParent::most_specific(Some(c), None, None).unwrap(), QuizParent::Course(c));
    }

    #[test]
    fn quiz_without_parent_is_rejected() {
        assert!(matches!(
            QuizParent::most_specific(None, None, None),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn pass_mark_defaults_to_thirty() {
        let q = NewQuiz::parse("Checkpoint", None, QuizParent::Course(CourseId::new())).unwrap();
        assert_eq!(q.pass_mark, DEFAULT_PASS_MARK);
        assert!(NewQuiz::parse("x", Some(101), QuizParent::Course(CourseId::new())).is_err());
    }

    #[test]
    fn question_needs_two_options() {
        assert!(NewQuestion::parse("Why?", None, None, opts(1)).is_err());
        assert!(NewQuestion::parse("", None, None, opts(2)).is_err());
        let q = NewQuestion::parse("Why?", None, None, opts(2)).unwrap();
        assert_eq!(q.points, 1);
        assert_eq!(q.question_type, QuestionType::MultipleChoice);
    }

    #[test]
    fn learner_view_hides_correctness() {
        let mut quiz = NewQuiz::parse("Q", None, QuizParent::Course(CourseId::new()))
            .unwrap()
            .into_quiz(Utc::now());
        quiz.questions.push(
            NewQuestion::parse("Pick", None, Some(2), opts(3))
                .unwrap()
                .into_question(quiz.id, 0),
        );
        let json = serde_json::to_value(quiz.view()).unwrap();
        let option = &json["questions"][0]["options"][0];
        assert!(option.get("isCorrect").is_none());
        assert!(option.get("is_correct").is_none());
        assert_eq!(json["parent"]["kind"], "course");
        assert_eq!(quiz.summary().question_count, 1);
    }
}
