use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{LessonId, UserId};

/// Completion marker for `(user_id, lesson_id)`. Upserted, so marking twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    pub fn completed(user_id: UserId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            lesson_id,
            completed: true,
            completed_at: Some(now),
        }
    }

    /// Merge a new completion into an existing record, keeping the first
    /// completion time.
    pub fn merge_completion(mut self, now: DateTime<Utc>) -> Self {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(now);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn merging_keeps_first_completion_time() {
        let first = Utc::now() - Duration::days(1);
        let p = LessonProgress::completed(UserId::new(), LessonId::new(), first);
        let merged = p.clone().merge_completion(Utc::now());
        assert_eq!(merged, p);
    }

    #[test]
    fn merging_incomplete_record_completes_it() {
        let now = Utc::now();
        let p = LessonProgress {
            user_id: UserId::new(),
            lesson_id: LessonId::new(),
            completed: false,
            completed_at: None,
        };
        let merged = p.merge_completion(now);
        assert!(merged.completed);
        assert_eq!(merged.completed_at, Some(now));
    }
}
