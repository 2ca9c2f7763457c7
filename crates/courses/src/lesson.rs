//! Lessons, their type-conditional payload, and the restricted projection.

use serde::{Deserialize, Serialize};

use lms_core::{DomainError, DomainResult, LessonId, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonType {
    Video,
    Text,
    File,
}

impl LessonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Video => "VIDEO",
            LessonType::Text => "TEXT",
            LessonType::File => "FILE",
        }
    }
}

impl core::str::FromStr for LessonType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIDEO" => Ok(LessonType::Video),
            "TEXT" => Ok(LessonType::Text),
            "FILE" => Ok(LessonType::File),
            other => Err(DomainError::validation(format!("unknown lesson type '{other}'"))),
        }
    }
}

/// Exactly one payload, always matching the lesson type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonContent {
    Video { video_url: String, duration: Option<i32> },
    Text { text_content: String },
    File { file_url: String },
}

impl LessonContent {
    pub fn lesson_type(&self) -> LessonType {
        match self {
            LessonContent::Video { .. } => LessonType::Video,
            LessonContent::Text { .. } => LessonType::Text,
            LessonContent::File { .. } => LessonType::File,
        }
    }

    pub fn duration(&self) -> Option<i32> {
        match self {
            LessonContent::Video { duration, .. } => *duration,
            LessonContent::Text { .. } | LessonContent::File { .. } => None,
        }
    }

    /// Build the payload for `kind` from loose fields; fields belonging to
    /// other types are dropped.
    pub fn build(
        kind: LessonType,
        video_url: Option<String>,
        duration: Option<i32>,
        text_content: Option<String>,
        file_url: Option<String>,
    ) -> DomainResult<Self> {
        match kind {
            LessonType::Video => {
                let video_url = required(video_url, "A VIDEO lesson needs a videoUrl")?;
                if matches!(duration, Some(d) if d < 0) {
                    return Err(DomainError::validation("Duration must be zero or positive"));
                }
                Ok(LessonContent::Video { video_url, duration })
            }
            LessonType::Text => Ok(LessonContent::Text {
                text_content: required(text_content, "A TEXT lesson needs textContent")?,
            }),
            LessonType::File => Ok(LessonContent::File {
                file_url: required(file_url, "A FILE lesson needs a fileUrl")?,
            }),
        }
    }
}

fn required(value: Option<String>, msg: &str) -> DomainResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::validation(msg))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub module_id: ModuleId,
    pub title: String,
    pub order: i32,
    pub content: LessonContent,
}

impl Lesson {
    pub fn lesson_type(&self) -> LessonType {
        self.content.lesson_type()
    }

    pub fn summary(&self) -> LessonSummary {
        LessonSummary {
            id: self.id,
            title: self.title.clone(),
            order: self.order,
            lesson_type: self.lesson_type(),
            duration: self.content.duration(),
            module_id: self.module_id,
        }
    }

    pub fn full(&self) -> LessonFull {
        let (video_url, text_content, file_url) = match &self.content {
            LessonContent::Video { video_url, .. } => (Some(video_url.clone()), None, None),
            LessonContent::Text { text_content } => (None, Some(text_content.clone()), None),
            LessonContent::File { file_url } => (None, None, Some(file_url.clone())),
        };
        LessonFull {
            id: self.id,
            module_id: self.module_id,
            title: self.title.clone(),
            order: self.order,
            lesson_type: self.lesson_type(),
            video_url,
            duration: self.content.duration(),
            text_content,
            file_url,
        }
    }

    /// Project the lesson for a reader with the given access level.
    pub fn view(&self, access: AccessLevel) -> LessonView {
        match access {
            AccessLevel::Full => LessonView::Full(self.full()),
            AccessLevel::Restricted => LessonView::Restricted(RestrictedLesson {
                summary: self.summary(),
                access: AccessLevel::Restricted,
            }),
        }
    }
}

/// Input for a new lesson, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub title: String,
    #[serde(default)]
    pub order: i32,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub video_url: Option<String>,
    pub duration: Option<i32>,
    pub text_content: Option<String>,
    pub file_url: Option<String>,
}

impl LessonDraft {
    pub fn into_lesson(self, module_id: ModuleId) -> DomainResult<Lesson> {
        let title = validate_title(&self.title)?;
        let order = validate_order(self.order)?;
        let content = LessonContent::build(
            self.lesson_type,
            self.video_url,
            self.duration,
            self.text_content,
            self.file_url,
        )?;
        Ok(Lesson {
            id: LessonId::new(),
            module_id,
            title,
            order,
            content,
        })
    }
}

/// Partial lesson update. Changing `type` requires the matching payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPatch {
    pub title: Option<String>,
    pub order: Option<i32>,
    #[serde(rename = "type")]
    pub lesson_type: Option<LessonType>,
    pub video_url: Option<String>,
    pub duration: Option<i32>,
    pub text_content: Option<String>,
    pub file_url: Option<String>,
}

impl LessonPatch {
    fn touches_content(&self) -> bool {
        self.lesson_type.is_some()
            || self.video_url.is_some()
            || self.duration.is_some()
            || self.text_content.is_some()
            || self.file_url.is_some()
    }

    pub fn apply(&self, lesson: &mut Lesson) -> DomainResult<()> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let order = self.order.map(validate_order).transpose()?;

        let content = if self.touches_content() {
            let kind = self.lesson_type.unwrap_or(lesson.lesson_type());
            let (cur_video, cur_duration, cur_text, cur_file) = match &lesson.content {
                LessonContent::Video { video_url, duration } => (Some(video_url.clone()), *duration, None, None),
                LessonContent::Text { text_content } => (None, None, Some(text_content.clone()), None),
                LessonContent::File { file_url } => (None, None, None, Some(file_url.clone())),
            };
            Some(LessonContent::build(
                kind,
                self.video_url.clone().or(cur_video),
                self.duration.or(cur_duration),
                self.text_content.clone().or(cur_text),
                self.file_url.clone().or(cur_file),
            )?)
        } else {
            None
        };

        if let Some(title) = title {
            lesson.title = title;
        }
        if let Some(order) = order {
            lesson.order = order;
        }
        if let Some(content) = content {
            lesson.content = content;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("A lesson must have a title"));
    }
    Ok(title.to_string())
}

fn validate_order(order: i32) -> DomainResult<i32> {
    if order < 0 {
        return Err(DomainError::validation("Lesson order must be zero or positive"));
    }
    Ok(order)
}

/// Whether a reader sees lesson payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Full,
    Restricted,
}

/// Non-sensitive lesson metadata; never carries payload fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub id: LessonId,
    pub title: String,
    pub order: i32,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub duration: Option<i32>,
    pub module_id: ModuleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFull {
    pub id: LessonId,
    pub module_id: ModuleId,
    pub title: String,
    pub order: i32,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub video_url: Option<String>,
    pub duration: Option<i32>,
    pub text_content: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictedLesson {
    #[serde(flatten)]
    pub summary: LessonSummary,
    pub access: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LessonView {
    Full(LessonFull),
    Restricted(RestrictedLesson),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(kind: LessonType) -> LessonDraft {
        LessonDraft {
            title: "Intro".into(),
            order: 1,
            lesson_type: kind,
            video_url: Some("https://cdn.example/v.mp4".into()),
            duration: Some(300),
            text_content: Some("hello".into()),
            file_url: Some("https://cdn.example/f.pdf".into()),
        }
    }

    #[test]
    fn only_matching_payload_is_kept() {
        let lesson = draft(LessonType::Text).into_lesson(ModuleId::new()).unwrap();
        assert_eq!(
            lesson.content,
            LessonContent::Text {
                text_content: "hello".into()
            }
        );
        let full = lesson.full();
        assert!(full.video_url.is_none());
        assert!(full.file_url.is_none());
        assert!(full.duration.is_none());
    }

    #[test]
    fn file_lesson_keeps_file_url() {
        let lesson = draft(LessonType::File).into_lesson(ModuleId::new()).unwrap();
        assert_eq!(
            lesson.content,
            LessonContent::File {
                file_url: "https://cdn.example/f.pdf".into()
            }
        );
    }

    #[test]
    fn missing_payload_is_rejected() {
        let mut d = draft(LessonType::Video);
        d.video_url = None;
        assert!(matches!(d.into_lesson(ModuleId::new()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn restricted_view_hides_payload() {
        let lesson = draft(LessonType::Video).into_lesson(ModuleId::new()).unwrap();
        let json = serde_json::to_value(lesson.view(AccessLevel::Restricted)).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["access", "duration", "id", "moduleId", "order", "title", "type"]);
        assert_eq!(obj["access"], "restricted");
        assert_eq!(obj["duration"], 300);
    }

    #[test]
    fn full_view_exposes_payload() {
        let lesson = draft(LessonType::Video).into_lesson(ModuleId::new()).unwrap();
        let json = serde_json::to_value(lesson.view(AccessLevel::Full)).unwrap();
        assert_eq!(json["videoUrl"], "https://cdn.example/v.mp4");
        assert_eq!(json["type"], "VIDEO");
        assert!(json.get("access").is_none());
    }

    #[test]
    fn patch_switching_type_requires_new_payload() {
        let mut lesson = LessonDraft {
            text_content: None,
            file_url: None,
            ..draft(LessonType::Video)
        }
        .into_lesson(ModuleId::new())
        .unwrap();

        let switch_without_payload = LessonPatch {
            lesson_type: Some(LessonType::Text),
            ..Default::default()
        };
        assert!(switch_without_payload.apply(&mut lesson).is_err());
        assert_eq!(lesson.lesson_type(), LessonType::Video);

        let switch = LessonPatch {
            lesson_type: Some(LessonType::Text),
            text_content: Some("now text".into()),
            ..Default::default()
        };
        switch.apply(&mut lesson).unwrap();
        assert_eq!(
            lesson.content,
            LessonContent::Text {
                text_content: "now text".into()
            }
        );
    }

    #[test]
    fn patch_duration_keeps_existing_url() {
        let mut lesson = draft(LessonType::Video).into_lesson(ModuleId::new()).unwrap();
        LessonPatch {
            duration: Some(42),
            ..Default::default()
        }
        .apply(&mut lesson)
        .unwrap();
        assert_eq!(
            lesson.content,
            LessonContent::Video {
                video_url: "https://cdn.example/v.mp4".into(),
                duration: Some(42)
            }
        );
    }
}
