//! crates/classroom_core/src/domain.rs
//!
//! Defines the core records of the platform: users, content library items,
//! lessons, classes and quizzes. These structs are independent of any database,
//! but derive `serde` so they can travel through the API and JSON columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::lesson::{ComponentType, LessonComponentContent};
use crate::quiz::Answer;

//=========================================================================================
// Users
//=========================================================================================

/// The closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::Developer => "developer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            "developer" => Some(Role::Developer),
            _ => None,
        }
    }

    /// Staff roles may author content and manage classes.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

/// Role-specific profile fields. The variant always matches `User::role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Student {
        #[serde(default)]
        grade_level: Option<String>,
        #[serde(default)]
        class_ids: Vec<Uuid>,
    },
    Teacher {
        #[serde(default)]
        district: Option<String>,
        #[serde(default)]
        subject_areas: Vec<String>,
    },
    Admin {
        #[serde(default)]
        admin_type: Option<String>,
        #[serde(default)]
        organization: Option<String>,
    },
    Developer {
        #[serde(default)]
        organization: Option<String>,
    },
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Student { .. } => Role::Student,
            RoleProfile::Teacher { .. } => Role::Teacher,
            RoleProfile::Admin { .. } => Role::Admin,
            RoleProfile::Developer { .. } => Role::Developer,
        }
    }

    /// An empty profile for the given role.
    pub fn empty(role: Role) -> Self {
        match role {
            Role::Student => RoleProfile::Student {
                grade_level: None,
                class_ids: Vec::new(),
            },
            Role::Teacher => RoleProfile::Teacher {
                district: None,
                subject_areas: Vec::new(),
            },
            Role::Admin => RoleProfile::Admin {
                admin_type: None,
                organization: None,
            },
            Role::Developer => RoleProfile::Developer { organization: None },
        }
    }
}

/// A platform user, as used throughout the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    pub profile: RoleProfile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Whether this user is a student enrolled in `class_id`.
    pub fn is_enrolled_in(&self, class_id: Uuid) -> bool {
        matches!(&self.profile, RoleProfile::Student { class_ids, .. } if class_ids.contains(&class_id))
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub status: UserStatus,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Content library
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Document,
    Video,
    Audio,
    Image,
    Interactive,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Document => "document",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Image => "image",
            ContentType::Interactive => "interactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(ContentType::Document),
            "video" => Some(ContentType::Video),
            "audio" => Some(ContentType::Audio),
            "image" => Some(ContentType::Image),
            "interactive" => Some(ContentType::Interactive),
            _ => None,
        }
    }
}

/// A unit of instructional material in the content library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub is_published: bool,
    pub version_number: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// An append-only history entry for a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: Uuid,
    pub content_id: Uuid,
    pub version_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub changes_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Lessons
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One configurable block composed into a lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonComponent {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub component_type: ComponentType,
    pub title: String,
    pub content: LessonComponentContent,
    pub order: i32,
    pub enabled: bool,
    pub is_assignable: bool,
    pub reading_level: Option<String>,
    pub language_code: Option<String>,
    pub read_aloud: bool,
}

//=========================================================================================
// Classes
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub teacher_id: Uuid,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAssignment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub title: String,
    pub lesson_id: Option<Uuid>,
    pub quiz_id: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Quizzes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    MultipleSelect,
    ShortAnswer,
    FillBlank,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::MultipleSelect => "multiple_select",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::FillBlank => "fill_blank",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "true_false" => Some(QuestionType::TrueFalse),
            "multiple_select" => Some(QuestionType::MultipleSelect),
            "short_answer" => Some(QuestionType::ShortAnswer),
            "fill_blank" => Some(QuestionType::FillBlank),
            _ => None,
        }
    }
}

/// Quiz-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub lesson_component_id: Option<Uuid>,
    pub title: String,
    pub time_limit_minutes: Option<u32>,
    pub attempts_allowed: Option<u32>,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    /// Minimum percentage (0-100) required to pass.
    pub pass_threshold: f64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_type: QuestionType,
    pub prompt: String,
    pub points: u32,
    pub position: i32,
    pub options: Vec<QuizOption>,
}

impl QuizQuestion {
    pub fn correct_options(&self) -> impl Iterator<Item = &QuizOption> {
        self.options.iter().filter(|o| o.is_correct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
    Reviewing,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::NotStarted => "not_started",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Reviewing => "reviewing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(AttemptStatus::NotStarted),
            "in_progress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            "reviewing" => Some(AttemptStatus::Reviewing),
            _ => None,
        }
    }
}

/// The grading outcome for a single question within an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub points_earned: u32,
}

/// One student's run through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub status: AttemptStatus,
    pub answers: std::collections::BTreeMap<Uuid, Answer>,
    /// Question ids in the order presented to the student.
    pub question_order: Vec<Uuid>,
    pub results: Vec<QuestionResult>,
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub passed: bool,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
