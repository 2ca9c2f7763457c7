use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{CourseId, DomainError, DomainResult, UserId, slugify};

/// Root of the content hierarchy.
///
/// # Invariants
/// - `slug` is always `slugify(title)` and is recomputed on every title change.
/// - `price`, when present, is finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub instructor_id: UserId,
    pub published: bool,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new course.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub price: Option<f64>,
}

impl NewCourse {
    pub fn parse(
        title: &str,
        description: Option<String>,
        published: Option<bool>,
        price: Option<f64>,
    ) -> DomainResult<Self> {
        let title = validate_title(title)?;
        validate_price(price)?;
        Ok(Self {
            title,
            description: description.filter(|d| !d.trim().is_empty()),
            published: published.unwrap_or(false),
            price,
        })
    }

    pub fn into_course(self, instructor_id: UserId, now: DateTime<Utc>) -> Course {
        Course {
            id: CourseId::new(),
            slug: slugify(&self.title),
            title: self.title,
            description: self.description,
            instructor_id,
            published: self.published,
            price: self.price,
            created_at: now,
        }
    }
}

/// Partial update of a course. Ownership is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<bool>,
    pub price: Option<f64>,
}

impl CoursePatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_price(self.price)
    }

    /// Apply the patch in place, re-deriving the slug if the title changed.
    pub fn apply(&self, course: &mut Course) -> DomainResult<()> {
        self.validate()?;
        if let Some(title) = &self.title {
            course.title = title.trim().to_string();
            course.slug = slugify(&course.title);
        }
        if let Some(description) = &self.description {
            course.description = Some(description.clone()).filter(|d| !d.trim().is_empty());
        }
        if let Some(published) = self.published {
            course.published = published;
        }
        if self.price.is_some() {
            course.price = self.price;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("A course must have a title"));
    }
    if slugify(title).is_empty() {
        return Err(DomainError::validation(
            "A course title must contain at least one letter or digit",
        ));
    }
    Ok(title.to_string())
}

fn validate_price(price: Option<f64>) -> DomainResult<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(DomainError::validation("Price must be a non-negative number"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(title: &str) -> Course {
        NewCourse::parse(title, None, None, Some(49.0))
            .unwrap()
            .into_course(UserId::new(), Utc::now())
    }

    #[test]
    fn slug_is_derived_from_title() {
        let c = course("Advanced Rust: Ownership");
        assert_eq!(c.slug, "advanced-rust-ownership");
        assert!(!c.published);
    }

    #[test]
    fn title_change_recomputes_slug() {
        let mut c = course("Old Title");
        let patch = CoursePatch {
            title: Some("Brand New Title".into()),
            ..Default::default()
        };
        patch.apply(&mut c).unwrap();
        assert_eq!(c.title, "Brand New Title");
        assert_eq!(c.slug, "brand-new-title");
    }

    #[test]
    fn patch_without_title_keeps_slug() {
        let mut c = course("Stable Title");
        CoursePatch {
            published: Some(true),
            ..Default::default()
        }
        .apply(&mut c)
        .unwrap();
        assert_eq!(c.slug, "stable-title");
        assert!(c.published);
    }

    #[test]
    fn rejects_empty_title_and_negative_price() {
        assert!(NewCourse::parse("   ", None, None, None).is_err());
        assert!(NewCourse::parse("???", None, None, None).is_err());
        assert!(NewCourse::parse("Fine", None, None, Some(-1.0)).is_err());
        assert!(NewCourse::parse("Fine", None, None, Some(f64::NAN)).is_err());
    }

    #[test]
    fn invalid_patch_leaves_course_untouched() {
        let mut c = course("Keep Me");
        let before = c.clone();
        let err = CoursePatch {
            title: Some("Changed".into()),
            price: Some(-5.0),
            ..Default::default()
        }
        .apply(&mut c);
        assert!(err.is_err());
        assert_eq!(c, before);
    }
}
