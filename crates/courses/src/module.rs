use serde::{Deserialize, Serialize};

use lms_core::{CourseId, DomainError, DomainResult, ModuleId};

/// A titled, ordered section of a course. Cannot exist without its course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModule {
    pub title: String,
    pub order: i32,
}

impl NewModule {
    pub fn parse(title: &str, order: i32) -> DomainResult<Self> {
        Ok(Self {
            title: validate_title(title)?,
            order: validate_order(order)?,
        })
    }

    pub fn into_module(self, course_id: CourseId) -> CourseModule {
        CourseModule {
            id: ModuleId::new(),
            course_id,
            title: self.title,
            order: self.order,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePatch {
    pub title: Option<String>,
    pub order: Option<i32>,
}

impl ModulePatch {
    pub fn apply(&self, module: &mut CourseModule) -> DomainResult<()> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let order = self.order.map(validate_order).transpose()?;
        if let Some(title) = title {
            module.title = title;
        }
        if let Some(order) = order {
            module.order = order;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("A module must have a title"));
    }
    Ok(title.to_string())
}

fn validate_order(order: i32) -> DomainResult<i32> {
    if order < 0 {
        return Err(DomainError::validation("Module order must be zero or positive"));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_updates_only_given_fields() {
        let mut m = NewModule::parse("Basics", 1).unwrap().into_module(CourseId::new());
        ModulePatch {
            order: Some(3),
            ..Default::default()
        }
        .apply(&mut m)
        .unwrap();
        assert_eq!(m.title, "Basics");
        assert_eq!(m.order, 3);
    }

    #[test]
    fn rejects_negative_order_and_blank_title() {
        assert!(NewModule::parse("x", -1).is_err());
        assert!(NewModule::parse(" ", 0).is_err());
    }
}
