use chrono::{DateTime, Utc};
use serde::Serialize;

use lms_core::{AttemptId, QuizId, UserId};

use crate::ScoreOutcome;

/// A scored submission. Recorded once and never edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub score: i64,
    pub total_points: i64,
    pub percentage: f64,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn record(user_id: UserId, quiz_id: QuizId, outcome: ScoreOutcome, now: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new(),
            user_id,
            quiz_id,
            score: outcome.score,
            total_points: outcome.total_points,
            percentage: outcome.percentage,
            passed: outcome.passed,
            created_at: now,
        }
    }
}
