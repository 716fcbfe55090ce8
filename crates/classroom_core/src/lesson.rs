//! crates/classroom_core/src/lesson.rs
//!
//! Lesson components: the `component_type` tag, the typed content carried by
//! each tag, and the editor/viewer dispatch built on top of them.
//!
//! Content arrives as an untyped JSON object. It is decoded at the boundary
//! into one `LessonComponentContent` variant per known tag; unknown tags keep
//! their object as `Generic`. A payload that does not fit its tag's schema is
//! rejected and never replaces the stored content.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::LessonComponent;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContentError {
    #[error("Content must be a JSON object")]
    NotAnObject,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Malformed content for component type '{component_type}': {reason}")]
    Malformed {
        component_type: String,
        reason: String,
    },
    #[error("Component type '{component_type}' has no field '{field}'")]
    UnknownField {
        component_type: String,
        field: String,
    },
    #[error("Invalid component order: {0}")]
    InvalidOrder(String),
}

//=========================================================================================
// Component Type Tag
//=========================================================================================

/// The tag selecting which editor and viewer apply to a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentType {
    Slides,
    Page,
    Video,
    Audio,
    Quiz,
    Poll,
    Discussion,
    Assignment,
    Reflection,
    Flashcards,
    Activity,
    Resource,
    Embed,
    Checklist,
    Instructions,
    /// A tag this build does not know. Kept verbatim.
    Other(String),
}

impl ComponentType {
    pub const KNOWN: [ComponentType; 15] = [
        ComponentType::Slides,
        ComponentType::Page,
        ComponentType::Video,
        ComponentType::Audio,
        ComponentType::Quiz,
        ComponentType::Poll,
        ComponentType::Discussion,
        ComponentType::Assignment,
        ComponentType::Reflection,
        ComponentType::Flashcards,
        ComponentType::Activity,
        ComponentType::Resource,
        ComponentType::Embed,
        ComponentType::Checklist,
        ComponentType::Instructions,
    ];

    pub fn parse(tag: &str) -> Self {
        match tag {
            "slides" => ComponentType::Slides,
            "page" => ComponentType::Page,
            "video" => ComponentType::Video,
            "audio" => ComponentType::Audio,
            "quiz" => ComponentType::Quiz,
            "poll" => ComponentType::Poll,
            "discussion" => ComponentType::Discussion,
            "assignment" => ComponentType::Assignment,
            "reflection" => ComponentType::Reflection,
            "flashcards" => ComponentType::Flashcards,
            "activity" => ComponentType::Activity,
            "resource" => ComponentType::Resource,
            "embed" => ComponentType::Embed,
            "checklist" => ComponentType::Checklist,
            "instructions" => ComponentType::Instructions,
            other => ComponentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentType::Slides => "slides",
            ComponentType::Page => "page",
            ComponentType::Video => "video",
            ComponentType::Audio => "audio",
            ComponentType::Quiz => "quiz",
            ComponentType::Poll => "poll",
            ComponentType::Discussion => "discussion",
            ComponentType::Assignment => "assignment",
            ComponentType::Reflection => "reflection",
            ComponentType::Flashcards => "flashcards",
            ComponentType::Activity => "activity",
            ComponentType::Resource => "resource",
            ComponentType::Embed => "embed",
            ComponentType::Checklist => "checklist",
            ComponentType::Instructions => "instructions",
            ComponentType::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ComponentType::Other(_))
    }
}

impl From<String> for ComponentType {
    fn from(tag: String) -> Self {
        ComponentType::parse(&tag)
    }
}

impl From<ComponentType> for String {
    fn from(component_type: ComponentType) -> Self {
        component_type.as_str().to_string()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Typed Content Schemas
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Slide {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub notes: String,
}

impl Slide {
    /// The text read aloud or translated for this slide.
    pub fn spoken_text(&self) -> String {
        match (self.title.trim(), self.body.trim()) {
            ("", body) => body.to_string(),
            (title, "") => title.to_string(),
            (title, body) => format!("{}. {}", title, body),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlidesContent {
    pub slides: Vec<Slide>,
    pub require_full_viewing: bool,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageContent {
    pub body: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoContent {
    pub url: String,
    pub transcript: String,
    pub start_seconds: u32,
    pub require_full_watch: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioContent {
    pub url: String,
    pub transcript: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuizContent {
    pub quiz_id: Option<Uuid>,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollContent {
    pub question: String,
    pub options: Vec<String>,
    pub allow_multiple: bool,
    pub show_results: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscussionContent {
    pub prompt: String,
    pub topic: String,
    pub require_reply: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssignmentContent {
    pub instructions: String,
    pub points: u32,
    pub allow_file_upload: bool,
    pub rubric: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectionContent {
    pub prompt: String,
    pub min_words: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashcardsContent {
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityContent {
    pub instructions: String,
    pub materials: Vec<String>,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceContent {
    pub url: String,
    pub description: String,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedContent {
    pub url: String,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecklistContent {
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstructionsContent {
    pub body: String,
}

/// The content bag of a component, decoded according to its tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LessonComponentContent {
    Slides(SlidesContent),
    Page(PageContent),
    Video(VideoContent),
    Audio(AudioContent),
    Quiz(QuizContent),
    Poll(PollContent),
    Discussion(DiscussionContent),
    Assignment(AssignmentContent),
    Reflection(ReflectionContent),
    Flashcards(FlashcardsContent),
    Activity(ActivityContent),
    Resource(ResourceContent),
    Embed(EmbedContent),
    Checklist(ChecklistContent),
    Instructions(InstructionsContent),
    /// Unknown tags, or stored content that no longer fits its tag.
    Generic(Map<String, Value>),
}

fn decode_as<T: DeserializeOwned>(
    component_type: &ComponentType,
    object: Map<String, Value>,
) -> Result<T, ContentError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| ContentError::Malformed {
        component_type: component_type.to_string(),
        reason: e.to_string(),
    })
}

impl LessonComponentContent {
    /// Decodes a JSON payload for `component_type`, rejecting malformed shapes
    /// and keys the type does not define.
    ///
    /// Null-valued fields are treated as absent and take their default.
    pub fn decode(component_type: &ComponentType, value: Value) -> Result<Self, ContentError> {
        let Value::Object(object) = value else {
            return Err(ContentError::NotAnObject);
        };
        let object: Map<String, Value> = object.into_iter().filter(|(_, v)| !v.is_null()).collect();

        let content = match component_type {
            ComponentType::Slides => Self::Slides(decode_as(component_type, object)?),
            ComponentType::Page => Self::Page(decode_as(component_type, object)?),
            ComponentType::Video => Self::Video(decode_as(component_type, object)?),
            ComponentType::Audio => Self::Audio(decode_as(component_type, object)?),
            ComponentType::Quiz => Self::Quiz(decode_as(component_type, object)?),
            ComponentType::Poll => Self::Poll(decode_as(component_type, object)?),
            ComponentType::Discussion => Self::Discussion(decode_as(component_type, object)?),
            ComponentType::Assignment => Self::Assignment(decode_as(component_type, object)?),
            ComponentType::Reflection => Self::Reflection(decode_as(component_type, object)?),
            ComponentType::Flashcards => Self::Flashcards(decode_as(component_type, object)?),
            ComponentType::Activity => Self::Activity(decode_as(component_type, object)?),
            ComponentType::Resource => Self::Resource(decode_as(component_type, object)?),
            ComponentType::Embed => Self::Embed(decode_as(component_type, object)?),
            ComponentType::Checklist => Self::Checklist(decode_as(component_type, object)?),
            ComponentType::Instructions => Self::Instructions(decode_as(component_type, object)?),
            ComponentType::Other(_) => Self::Generic(object),
        };
        Ok(content)
    }

    /// Decoding used when reading stored rows: content that no longer fits its
    /// tag is kept as `Generic` so it can still be displayed.
    pub fn decode_stored(component_type: &ComponentType, value: Value) -> Self {
        match Self::decode(component_type, value.clone()) {
            Ok(content) => content,
            Err(_) => match value {
                Value::Object(object) => Self::Generic(object),
                _ => Self::Generic(Map::new()),
            },
        }
    }

    /// The empty content for a freshly created component.
    pub fn default_for(component_type: &ComponentType) -> Self {
        Self::decode(component_type, Value::Object(Map::new()))
            .unwrap_or_else(|_| Self::Generic(Map::new()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    fn to_object(&self) -> Map<String, Value> {
        match self.to_value() {
            Value::Object(object) => object,
            _ => Map::new(),
        }
    }
}

//=========================================================================================
// Editor Dispatch
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKind {
    Slides,
    Page,
    Video,
    Audio,
    Quiz,
    Poll,
    Discussion,
    Assignment,
    Reflection,
    Flashcards,
    Activity,
    Resource,
    Embed,
    Checklist,
    Instructions,
    GenericJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Url,
    Number,
    Toggle,
    TextList,
    SlideList,
    CardList,
    QuizRef,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, label, kind }
}

/// The editor variant for a component type and the fields it edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditorSpec {
    pub kind: EditorKind,
    pub fields: &'static [FieldSpec],
}

impl EditorSpec {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

use FieldKind::*;

const SLIDES_FIELDS: &[FieldSpec] = &[
    field("slides", "Slides", SlideList),
    field("require_full_viewing", "Require viewing every slide", Toggle),
    field("file_url", "Source file", Url),
];
const PAGE_FIELDS: &[FieldSpec] = &[field("body", "Body", LongText), field("image_url", "Image", Url)];
const VIDEO_FIELDS: &[FieldSpec] = &[
    field("url", "Video URL", Url),
    field("transcript", "Transcript", LongText),
    field("start_seconds", "Start at (seconds)", Number),
    field("require_full_watch", "Require full watch", Toggle),
];
const AUDIO_FIELDS: &[FieldSpec] = &[
    field("url", "Audio URL", Url),
    field("transcript", "Transcript", LongText),
];
const QUIZ_FIELDS: &[FieldSpec] = &[
    field("quiz_id", "Quiz", QuizRef),
    field("instructions", "Instructions", LongText),
];
const POLL_FIELDS: &[FieldSpec] = &[
    field("question", "Question", Text),
    field("options", "Options", TextList),
    field("allow_multiple", "Allow multiple choices", Toggle),
    field("show_results", "Show results to students", Toggle),
];
const DISCUSSION_FIELDS: &[FieldSpec] = &[
    field("prompt", "Prompt", LongText),
    field("topic", "Topic", Text),
    field("require_reply", "Require a reply", Toggle),
];
const ASSIGNMENT_FIELDS: &[FieldSpec] = &[
    field("instructions", "Instructions", LongText),
    field("points", "Points", Number),
    field("allow_file_upload", "Allow file upload", Toggle),
    field("rubric", "Rubric", LongText),
];
const REFLECTION_FIELDS: &[FieldSpec] = &[
    field("prompt", "Prompt", LongText),
    field("min_words", "Minimum words", Number),
];
const FLASHCARDS_FIELDS: &[FieldSpec] = &[field("cards", "Cards", CardList)];
const ACTIVITY_FIELDS: &[FieldSpec] = &[
    field("instructions", "Instructions", LongText),
    field("materials", "Materials", TextList),
    field("duration_minutes", "Duration (minutes)", Number),
];
const RESOURCE_FIELDS: &[FieldSpec] = &[
    field("url", "Link", Url),
    field("description", "Description", LongText),
    field("file_url", "File", Url),
];
const EMBED_FIELDS: &[FieldSpec] = &[field("url", "Embed URL", Url), field("height", "Height", Number)];
const CHECKLIST_FIELDS: &[FieldSpec] = &[field("items", "Items", TextList)];
const INSTRUCTIONS_FIELDS: &[FieldSpec] = &[field("body", "Instructions", LongText)];
const GENERIC_FIELDS: &[FieldSpec] = &[field("content", "Content (JSON)", Json)];

/// Selects the editor for a component type. Unknown tags get the JSON editor.
pub fn editor_for(component_type: &ComponentType) -> EditorSpec {
    let (kind, fields) = match component_type {
        ComponentType::Slides => (EditorKind::Slides, SLIDES_FIELDS),
        ComponentType::Page => (EditorKind::Page, PAGE_FIELDS),
        ComponentType::Video => (EditorKind::Video, VIDEO_FIELDS),
        ComponentType::Audio => (EditorKind::Audio, AUDIO_FIELDS),
        ComponentType::Quiz => (EditorKind::Quiz, QUIZ_FIELDS),
        ComponentType::Poll => (EditorKind::Poll, POLL_FIELDS),
        ComponentType::Discussion => (EditorKind::Discussion, DISCUSSION_FIELDS),
        ComponentType::Assignment => (EditorKind::Assignment, ASSIGNMENT_FIELDS),
        ComponentType::Reflection => (EditorKind::Reflection, REFLECTION_FIELDS),
        ComponentType::Flashcards => (EditorKind::Flashcards, FLASHCARDS_FIELDS),
        ComponentType::Activity => (EditorKind::Activity, ACTIVITY_FIELDS),
        ComponentType::Resource => (EditorKind::Resource, RESOURCE_FIELDS),
        ComponentType::Embed => (EditorKind::Embed, EMBED_FIELDS),
        ComponentType::Checklist => (EditorKind::Checklist, CHECKLIST_FIELDS),
        ComponentType::Instructions => (EditorKind::Instructions, INSTRUCTIONS_FIELDS),
        ComponentType::Other(_) => (EditorKind::GenericJson, GENERIC_FIELDS),
    };
    EditorSpec { kind, fields }
}

/// Applies a single field edit: the previous content merged with the changed
/// field replaces the whole content object.
pub fn apply_field_edit(
    component: &mut LessonComponent,
    field: &str,
    value: Value,
) -> Result<(), ContentError> {
    let editor = editor_for(&component.component_type);
    if component.component_type.is_known() && !editor.has_field(field) {
        return Err(ContentError::UnknownField {
            component_type: component.component_type.to_string(),
            field: field.to_string(),
        });
    }

    let mut merged = component.content.to_object();
    merged.insert(field.to_string(), value);
    let content = LessonComponentContent::decode(&component.component_type, Value::Object(merged))?;
    component.content = content;
    Ok(())
}

/// The generic JSON editor path. Invalid JSON leaves the content unchanged.
pub fn apply_json_edit(component: &mut LessonComponent, text: &str) -> Result<(), ContentError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ContentError::InvalidJson(e.to_string()))?;
    let content = LessonComponentContent::decode(&component.component_type, value)?;
    component.content = content;
    Ok(())
}

//=========================================================================================
// Viewer Dispatch
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
}

/// What a student sees for a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "viewer", rename_all = "snake_case")]
pub enum ViewBody {
    Presentation {
        slides: Vec<Slide>,
        slide_count: usize,
        require_full_viewing: bool,
    },
    Reading {
        body: String,
        image_url: Option<String>,
    },
    Media {
        kind: MediaKind,
        url: String,
        transcript: String,
        start_seconds: u32,
        require_full_watch: bool,
    },
    Quiz {
        quiz_id: Option<Uuid>,
        instructions: String,
    },
    Poll {
        question: String,
        options: Vec<String>,
        allow_multiple: bool,
        show_results: bool,
    },
    Prompt {
        prompt: String,
        topic: Option<String>,
        min_words: u32,
        require_reply: bool,
    },
    Assignment {
        instructions: String,
        points: u32,
        allow_file_upload: bool,
        rubric: String,
    },
    Flashcards {
        cards: Vec<Flashcard>,
    },
    Activity {
        instructions: String,
        materials: Vec<String>,
        duration_minutes: Option<u32>,
    },
    Link {
        url: String,
        description: String,
        file_url: Option<String>,
    },
    Embed {
        url: String,
        height: u32,
    },
    Checklist {
        items: Vec<String>,
    },
    Generic {
        title: String,
        body: String,
        prompt: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentView {
    pub id: Uuid,
    pub component_type: ComponentType,
    pub title: String,
    pub reading_level: Option<String>,
    pub language_code: Option<String>,
    pub read_aloud: bool,
    #[serde(flatten)]
    pub body: ViewBody,
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn generic_view(title: &str, object: &Map<String, Value>) -> ViewBody {
    let title = if title.trim().is_empty() {
        first_string(object, &["title"])
    } else {
        title.to_string()
    };
    ViewBody::Generic {
        title,
        body: first_string(object, &["body", "text", "content", "description"]),
        prompt: first_string(object, &["prompt", "question"]),
    }
}

/// Selects the viewer for a component. Never fails: anything without a typed
/// viewer is shown as a generic title/body/prompt block.
pub fn render(component: &LessonComponent) -> ComponentView {
    use LessonComponentContent as C;

    let body = match &component.content {
        C::Slides(c) => ViewBody::Presentation {
            slide_count: c.slides.len(),
            slides: c.slides.clone(),
            require_full_viewing: c.require_full_viewing,
        },
        C::Page(c) => ViewBody::Reading {
            body: c.body.clone(),
            image_url: c.image_url.clone(),
        },
        C::Instructions(c) => ViewBody::Reading {
            body: c.body.clone(),
            image_url: None,
        },
        C::Video(c) => ViewBody::Media {
            kind: MediaKind::Video,
            url: c.url.clone(),
            transcript: c.transcript.clone(),
            start_seconds: c.start_seconds,
            require_full_watch: c.require_full_watch,
        },
        C::Audio(c) => ViewBody::Media {
            kind: MediaKind::Audio,
            url: c.url.clone(),
            transcript: c.transcript.clone(),
            start_seconds: 0,
            require_full_watch: false,
        },
        C::Quiz(c) => ViewBody::Quiz {
            quiz_id: c.quiz_id,
            instructions: c.instructions.clone(),
        },
        C::Poll(c) => ViewBody::Poll {
            question: c.question.clone(),
            options: c.options.clone(),
            allow_multiple: c.allow_multiple,
            show_results: c.show_results,
        },
        C::Discussion(c) => ViewBody::Prompt {
            prompt: c.prompt.clone(),
            topic: Some(c.topic.clone()).filter(|t| !t.is_empty()),
            min_words: 0,
            require_reply: c.require_reply,
        },
        C::Reflection(c) => ViewBody::Prompt {
            prompt: c.prompt.clone(),
            topic: None,
            min_words: c.min_words,
            require_reply: true,
        },
        C::Assignment(c) => ViewBody::Assignment {
            instructions: c.instructions.clone(),
            points: c.points,
            allow_file_upload: c.allow_file_upload,
            rubric: c.rubric.clone(),
        },
        C::Flashcards(c) => ViewBody::Flashcards {
            cards: c.cards.clone(),
        },
        C::Activity(c) => ViewBody::Activity {
            instructions: c.instructions.clone(),
            materials: c.materials.clone(),
            duration_minutes: c.duration_minutes,
        },
        C::Resource(c) => ViewBody::Link {
            url: c.url.clone(),
            description: c.description.clone(),
            file_url: c.file_url.clone(),
        },
        C::Embed(c) => ViewBody::Embed {
            url: c.url.clone(),
            height: c.height,
        },
        C::Checklist(c) => ViewBody::Checklist {
            items: c.items.clone(),
        },
        C::Generic(object) => generic_view(&component.title, object),
    };

    ComponentView {
        id: component.id,
        component_type: component.component_type.clone(),
        title: component.title.clone(),
        reading_level: component.reading_level.clone(),
        language_code: component.language_code.clone(),
        read_aloud: component.read_aloud,
        body,
    }
}

//=========================================================================================
// Lesson Builder Helpers
//=========================================================================================

/// The `order` value for a component appended to the end of the lesson.
pub fn next_order(components: &[LessonComponent]) -> i32 {
    components.iter().map(|c| c.order).max().map_or(0, |max| max + 1)
}

/// Components a student sees, in display order.
pub fn deliverable(components: &[LessonComponent]) -> Vec<&LessonComponent> {
    let mut visible: Vec<&LessonComponent> = components.iter().filter(|c| c.enabled).collect();
    visible.sort_by_key(|c| c.order);
    visible
}

/// Assigns `order` from the position of each id in `ordered_ids`, which must
/// name every component of the lesson exactly once.
pub fn reorder(
    components: &mut [LessonComponent],
    ordered_ids: &[Uuid],
) -> Result<Vec<(Uuid, i32)>, ContentError> {
    if ordered_ids.len() != components.len() {
        return Err(ContentError::InvalidOrder(format!(
            "expected {} component ids, got {}",
            components.len(),
            ordered_ids.len()
        )));
    }
    let mut seen = HashSet::new();
    for id in ordered_ids {
        if !seen.insert(*id) {
            return Err(ContentError::InvalidOrder(format!("component {} listed twice", id)));
        }
        if !components.iter().any(|c| c.id == *id) {
            return Err(ContentError::InvalidOrder(format!(
                "component {} is not part of this lesson",
                id
            )));
        }
    }

    let mut orders = Vec::with_capacity(ordered_ids.len());
    for (position, id) in ordered_ids.iter().enumerate() {
        let position = position as i32;
        if let Some(component) = components.iter_mut().find(|c| c.id == *id) {
            component.order = position;
        }
        orders.push((*id, position));
    }
    components.sort_by_key(|c| c.order);
    Ok(orders)
}

/// Closes gaps in `order` after a deletion, keeping relative order.
pub fn renormalize(components: &mut [LessonComponent]) -> Vec<(Uuid, i32)> {
    components.sort_by_key(|c| c.order);
    components
        .iter_mut()
        .enumerate()
        .filter_map(|(position, component)| {
            let position = position as i32;
            if component.order == position {
                None
            } else {
                component.order = position;
                Some((component.id, position))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(component_type: ComponentType, content: Value) -> LessonComponent {
        LessonComponent {
            id: Uuid::new_v4(),
            lesson_id: Uuid::nil(),
            content: LessonComponentContent::decode_stored(&component_type, content),
            component_type,
            title: "Photosynthesis".to_string(),
            order: 0,
            enabled: true,
            is_assignable: false,
            reading_level: None,
            language_code: None,
            read_aloud: false,
        }
    }

    #[test]
    fn component_type_round_trips_unknown_tags() {
        assert_eq!(ComponentType::parse("poll"), ComponentType::Poll);
        let other = ComponentType::parse("hologram");
        assert_eq!(other, ComponentType::Other("hologram".to_string()));
        assert_eq!(other.as_str(), "hologram");
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("hologram"));
        let parsed: ComponentType = serde_json::from_value(json!("slides")).unwrap();
        assert_eq!(parsed, ComponentType::Slides);
    }

    #[test]
    fn every_known_type_has_a_dedicated_editor() {
        for component_type in ComponentType::KNOWN.iter() {
            assert_ne!(editor_for(component_type).kind, EditorKind::GenericJson);
        }
        let editor = editor_for(&ComponentType::Other("mystery".into()));
        assert_eq!(editor.kind, EditorKind::GenericJson);
    }

    #[test]
    fn decode_fills_missing_and_null_fields_with_defaults() {
        let content = LessonComponentContent::decode(
            &ComponentType::Video,
            json!({ "url": "https://videos.example/cells.mp4", "transcript": null }),
        )
        .unwrap();
        let LessonComponentContent::Video(video) = content else {
            panic!("expected video content");
        };
        assert_eq!(video.url, "https://videos.example/cells.mp4");
        assert_eq!(video.transcript, "");
        assert_eq!(video.start_seconds, 0);
    }

    #[test]
    fn decode_rejects_wrong_field_types() {
        let err = LessonComponentContent::decode(&ComponentType::Poll, json!({ "options": "yes,no" }))
            .unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));
        let err = LessonComponentContent::decode(&ComponentType::Page, json!(["not", "an", "object"]))
            .unwrap_err();
        assert_eq!(err, ContentError::NotAnObject);
    }

    #[test]
    fn decode_rejects_keys_the_type_does_not_define() {
        let err = LessonComponentContent::decode(
            &ComponentType::Page,
            json!({ "body": "Cells are small.", "colour": "red" }),
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));

        let err = LessonComponentContent::decode(
            &ComponentType::Slides,
            json!({ "slides": [{ "title": "Cells", "speaker": "Ms. Ortiz" }] }),
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));

        let mut page = component(ComponentType::Page, json!({ "body": "Cells are small." }));
        let before = page.content.clone();
        let err = apply_json_edit(&mut page, r#"{ "body": "Atoms", "colour": "red" }"#).unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));
        assert_eq!(page.content, before);
    }

    #[test]
    fn stored_content_with_extra_keys_is_kept_as_generic() {
        let content = LessonComponentContent::decode_stored(
            &ComponentType::Page,
            json!({ "body": "Cells are small.", "legacy_theme": "dark" }),
        );
        let LessonComponentContent::Generic(object) = content else {
            panic!("expected generic content");
        };
        assert_eq!(object.get("legacy_theme"), Some(&json!("dark")));
    }

    #[test]
    fn stored_content_that_no_longer_fits_becomes_generic() {
        let content =
            LessonComponentContent::decode_stored(&ComponentType::Reflection, json!({ "min_words": "ten" }));
        assert!(matches!(content, LessonComponentContent::Generic(_)));
    }

    #[test]
    fn field_edit_merges_with_previous_content() {
        let mut poll = component(
            ComponentType::Poll,
            json!({ "question": "Favourite planet?", "options": ["Mars", "Venus"] }),
        );
        apply_field_edit(&mut poll, "allow_multiple", json!(true)).unwrap();

        let LessonComponentContent::Poll(content) = &poll.content else {
            panic!("expected poll content");
        };
        assert_eq!(content.question, "Favourite planet?");
        assert_eq!(content.options, vec!["Mars", "Venus"]);
        assert!(content.allow_multiple);
    }

    #[test]
    fn field_edit_rejects_unknown_fields_and_bad_values() {
        let mut page = component(ComponentType::Page, json!({ "body": "Cells are small." }));
        let before = page.content.clone();

        let err = apply_field_edit(&mut page, "colour", json!("red")).unwrap_err();
        assert!(matches!(err, ContentError::UnknownField { .. }));
        let err = apply_field_edit(&mut page, "body", json!(42)).unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));
        assert_eq!(page.content, before);
    }

    #[test]
    fn field_edit_on_unknown_type_accepts_any_field() {
        let mut custom = component(ComponentType::Other("lab".into()), json!({ "body": "Mix" }));
        apply_field_edit(&mut custom, "safety", json!("goggles")).unwrap();
        let LessonComponentContent::Generic(object) = &custom.content else {
            panic!("expected generic content");
        };
        assert_eq!(object.get("safety"), Some(&json!("goggles")));
        assert_eq!(object.get("body"), Some(&json!("Mix")));
    }

    #[test]
    fn json_edit_applies_valid_json() {
        let mut custom = component(ComponentType::Other("lab".into()), json!({}));
        apply_json_edit(&mut custom, r#"{"body":"Measure twice","prompt":"Why?"}"#).unwrap();
        assert_eq!(
            custom.content.to_value(),
            json!({ "body": "Measure twice", "prompt": "Why?" })
        );
    }

    #[test]
    fn json_edit_with_invalid_json_leaves_content_unchanged() {
        let mut custom = component(ComponentType::Other("lab".into()), json!({ "body": "Keep me" }));
        let before = custom.content.clone();

        let err = apply_json_edit(&mut custom, "{ body: oops").unwrap_err();
        assert!(matches!(err, ContentError::InvalidJson(_)));
        assert_eq!(custom.content, before);

        let err = apply_json_edit(&mut custom, "[1, 2]").unwrap_err();
        assert_eq!(err, ContentError::NotAnObject);
        assert_eq!(custom.content, before);
    }

    #[test]
    fn unknown_component_type_renders_generic_view() {
        let custom = component(
            ComponentType::Other("hologram".into()),
            json!({ "text": "Look closely", "question": "What do you see?", "extra": [1, 2] }),
        );
        let view = render(&custom);
        assert_eq!(
            view.body,
            ViewBody::Generic {
                title: "Photosynthesis".to_string(),
                body: "Look closely".to_string(),
                prompt: "What do you see?".to_string(),
            }
        );
    }

    #[test]
    fn generic_view_tolerates_non_string_fields() {
        let custom = component(ComponentType::Other("x".into()), json!({ "body": 7, "prompt": null }));
        let view = render(&custom);
        assert!(matches!(view.body, ViewBody::Generic { ref body, .. } if body.is_empty()));
    }

    #[test]
    fn slides_render_as_presentation() {
        let slides = component(
            ComponentType::Slides,
            json!({ "slides": [{ "title": "One" }, { "title": "Two", "body": "More" }], "require_full_viewing": true }),
        );
        match render(&slides).body {
            ViewBody::Presentation {
                slide_count,
                require_full_viewing,
                ..
            } => {
                assert_eq!(slide_count, 2);
                assert!(require_full_viewing);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn reorder_requires_a_permutation() {
        let mut components = vec![
            component(ComponentType::Page, json!({})),
            component(ComponentType::Quiz, json!({})),
            component(ComponentType::Poll, json!({})),
        ];
        let ids: Vec<Uuid> = components.iter().map(|c| c.id).collect();

        let err = reorder(&mut components, &[ids[0], ids[0], ids[1]]).unwrap_err();
        assert!(matches!(err, ContentError::InvalidOrder(_)));
        let err = reorder(&mut components, &[ids[0], ids[1]]).unwrap_err();
        assert!(matches!(err, ContentError::InvalidOrder(_)));

        let orders = reorder(&mut components, &[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(orders, vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]);
        assert_eq!(components[0].id, ids[2]);
    }

    #[test]
    fn renormalize_closes_gaps() {
        let mut components = vec![
            component(ComponentType::Page, json!({})),
            component(ComponentType::Quiz, json!({})),
        ];
        components[0].order = 0;
        components[1].order = 4;
        let changed = renormalize(&mut components);
        assert_eq!(changed, vec![(components[1].id, 1)]);
        assert_eq!(next_order(&components), 2);
    }

    #[test]
    fn deliverable_skips_disabled_components() {
        let mut components = vec![
            component(ComponentType::Page, json!({})),
            component(ComponentType::Quiz, json!({})),
        ];
        components[0].order = 1;
        components[1].order = 0;
        components[1].enabled = false;
        let visible = deliverable(&components);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, components[0].id);
    }
}
