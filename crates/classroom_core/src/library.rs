//! crates/classroom_core/src/library.rs
//!
//! Content library rules: form validation, tag normalisation, publish state,
//! version history and search filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{ContentItem, ContentType, ContentVersion};
use crate::users::ValidationError;

/// The form submitted to create or edit a content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentForm {
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims tags, drops empty ones and removes duplicates (case-insensitive),
/// keeping the first occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Cleaned, validated form values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidContent {
    pub title: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
}

impl ContentForm {
    pub fn validate(self) -> Result<ValidContent, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push(ValidationError::new("title", "Title is required"));
        }
        let content_type = ContentType::parse(self.content_type.trim());
        if content_type.is_none() {
            errors.push(ValidationError::new(
                "content_type",
                "Content type must be one of document, video, audio, image, interactive",
            ));
        }

        match content_type {
            Some(content_type) if errors.is_empty() => Ok(ValidContent {
                title,
                description: blank_to_none(self.description),
                content_type,
                file_url: blank_to_none(self.file_url),
                thumbnail_url: blank_to_none(self.thumbnail_url),
                tags: normalize_tags(&self.tags),
                subject: blank_to_none(self.subject),
                grade_level: blank_to_none(self.grade_level),
            }),
            _ => Err(errors),
        }
    }
}

/// A brand-new, unpublished item at version 1.
pub fn new_item(form: ValidContent, created_by: Uuid, now: DateTime<Utc>) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        title: form.title,
        description: form.description,
        content_type: form.content_type,
        file_url: form.file_url,
        thumbnail_url: form.thumbnail_url,
        tags: form.tags,
        subject: form.subject,
        grade_level: form.grade_level,
        is_published: false,
        version_number: 1,
        created_at: now,
        created_by,
    }
}

/// Applies an edit and produces the version record that goes with it. The
/// version number always advances by exactly one.
pub fn revise(
    current: &ContentItem,
    edit: ValidContent,
    changes_summary: Option<String>,
    now: DateTime<Utc>,
) -> (ContentItem, ContentVersion) {
    let version_number = current.version_number + 1;
    let item = ContentItem {
        title: edit.title,
        description: edit.description,
        content_type: edit.content_type,
        file_url: edit.file_url,
        thumbnail_url: edit.thumbnail_url,
        tags: edit.tags,
        subject: edit.subject,
        grade_level: edit.grade_level,
        version_number,
        ..current.clone()
    };
    let version = ContentVersion {
        id: Uuid::new_v4(),
        content_id: current.id,
        version_number,
        title: item.title.clone(),
        description: item.description.clone(),
        changes_summary: blank_to_none(changes_summary),
        created_at: now,
    };
    (item, version)
}

/// The badge shown for an item's publish state.
pub fn publish_badge(is_published: bool) -> &'static str {
    if is_published {
        "Published"
    } else {
        "Draft"
    }
}

/// Flips the publish flag and returns the new badge text.
pub fn toggle_publish(item: &mut ContentItem) -> &'static str {
    item.is_published = !item.is_published;
    publish_badge(item.is_published)
}

/// Search filter for the library listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilter {
    pub query: Option<String>,
    pub content_type: Option<ContentType>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub tag: Option<String>,
    pub published_only: bool,
}

fn same_text(a: &Option<String>, b: &str) -> bool {
    a.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(b.trim()))
}

impl ContentFilter {
    pub fn matches(&self, item: &ContentItem) -> bool {
        if self.published_only && !item.is_published {
            return false;
        }
        if self.content_type.is_some_and(|t| t != item.content_type) {
            return false;
        }
        if let Some(subject) = self.subject.as_deref().filter(|s| !s.trim().is_empty()) {
            if !same_text(&item.subject, subject) {
                return false;
            }
        }
        if let Some(grade) = self.grade_level.as_deref().filter(|s| !s.trim().is_empty()) {
            if !same_text(&item.grade_level, grade) {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref().filter(|s| !s.trim().is_empty()) {
            if !item.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim())) {
                return false;
            }
        }
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            let in_title = item.title.to_lowercase().contains(&query);
            let in_description = item
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query));
            let in_tags = item.tags.iter().any(|t| t.to_lowercase().contains(&query));
            if !(in_title || in_description || in_tags) {
                return false;
            }
        }
        true
    }

    /// Matching items, newest first.
    pub fn apply(&self, items: Vec<ContentItem>) -> Vec<ContentItem> {
        let mut matching: Vec<ContentItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ContentForm {
        ContentForm {
            title: "  Water Cycle ".to_string(),
            content_type: "video".to_string(),
            tags: vec![" science".into(), "".into(), "Science".into(), "weather ".into()],
            description: Some("   ".to_string()),
            subject: Some("Earth Science".to_string()),
            ..ContentForm::default()
        }
    }

    fn item() -> ContentItem {
        new_item(form().validate().unwrap(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn validation_cleans_the_form() {
        let valid = form().validate().unwrap();
        assert_eq!(valid.title, "Water Cycle");
        assert_eq!(valid.content_type, ContentType::Video);
        assert_eq!(valid.tags, vec!["science", "weather"]);
        assert_eq!(valid.description, None);
    }

    #[test]
    fn validation_reports_every_missing_field() {
        let errors = ContentForm::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "content_type"]);
    }

    #[test]
    fn toggling_publish_flips_badge() {
        let mut item = item();
        assert_eq!(publish_badge(item.is_published), "Draft");
        assert_eq!(toggle_publish(&mut item), "Published");
        assert!(item.is_published);
        assert_eq!(toggle_publish(&mut item), "Draft");
        assert!(!item.is_published);
    }

    #[test]
    fn revisions_advance_the_version_by_one() {
        let current = item();
        let mut edit = form().validate().unwrap();
        edit.title = "Water Cycle (updated)".to_string();
        let (updated, version) = revise(&current, edit, Some("Retitled".into()), Utc::now());

        assert_eq!(updated.version_number, current.version_number + 1);
        assert_eq!(version.version_number, updated.version_number);
        assert_eq!(version.content_id, current.id);
        assert_eq!(updated.id, current.id);
        assert_eq!(updated.created_by, current.created_by);
        assert_eq!(updated.is_published, current.is_published);
        assert_eq!(version.changes_summary.as_deref(), Some("Retitled"));
    }

    #[test]
    fn filter_matches_query_tags_and_publish_state() {
        let mut published = item();
        published.is_published = true;
        let draft = item();

        let filter = ContentFilter {
            query: Some("CYCLE".into()),
            tag: Some("Weather".into()),
            ..ContentFilter::default()
        };
        assert!(filter.matches(&draft));

        let filter = ContentFilter {
            published_only: true,
            ..ContentFilter::default()
        };
        assert_eq!(filter.apply(vec![draft.clone(), published.clone()]).len(), 1);

        let filter = ContentFilter {
            content_type: Some(ContentType::Audio),
            ..ContentFilter::default()
        };
        assert!(!filter.matches(&published));
    }
}
