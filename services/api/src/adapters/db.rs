//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the repository ports from the `core` crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classroom_core::domain::{
    AttemptStatus, Class, ClassAssignment, ContentItem, ContentType, ContentVersion, Lesson,
    LessonComponent, QuestionResult, QuestionType, Quiz, QuizAttempt, QuizOption, QuizQuestion,
    Role, RoleProfile, User, UserCredentials, UserStatus,
};
use classroom_core::lesson::{ComponentType, LessonComponentContent};
use classroom_core::ports::{
    ClassRepository, ContentRepository, LessonRepository, NewUserRecord, PortError, PortResult,
    QuizRepository, UserRepository,
};
use classroom_core::quiz::Answer;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a missing row to `NotFound` and anything else to `Unexpected`.
fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn ensure_affected(rows: u64, what: String) -> PortResult<()> {
    if rows == 0 {
        return Err(PortError::NotFound(what));
    }
    Ok(())
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    status: String,
    profile: Json<RoleProfile>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        let role = Role::parse(&self.role).unwrap_or(Role::Student);
        let profile = self.profile.0;
        // The role column wins if the stored profile disagrees with it.
        let profile = if profile.role() == role {
            profile
        } else {
            RoleProfile::empty(role)
        };
        User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            status: UserStatus::parse(&self.status).unwrap_or(UserStatus::Inactive),
            profile,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    status: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
            status: UserStatus::parse(&self.status).unwrap_or(UserStatus::Inactive),
        }
    }
}

#[derive(FromRow)]
struct ContentRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    content_type: String,
    file_url: Option<String>,
    thumbnail_url: Option<String>,
    tags: Vec<String>,
    subject: Option<String>,
    grade_level: Option<String>,
    is_published: bool,
    version_number: i32,
    created_at: DateTime<Utc>,
    created_by: Uuid,
}
impl ContentRecord {
    fn to_domain(self) -> ContentItem {
        ContentItem {
            id: self.id,
            title: self.title,
            description: self.description,
            content_type: ContentType::parse(&self.content_type).unwrap_or(ContentType::Document),
            file_url: self.file_url,
            thumbnail_url: self.thumbnail_url,
            tags: self.tags,
            subject: self.subject,
            grade_level: self.grade_level,
            is_published: self.is_published,
            version_number: self.version_number,
            created_at: self.created_at,
            created_by: self.created_by,
        }
    }
}

#[derive(FromRow)]
struct VersionRecord {
    id: Uuid,
    content_id: Uuid,
    version_number: i32,
    title: String,
    description: Option<String>,
    changes_summary: Option<String>,
    created_at: DateTime<Utc>,
}
impl VersionRecord {
    fn to_domain(self) -> ContentVersion {
        ContentVersion {
            id: self.id,
            content_id: self.content_id,
            version_number: self.version_number,
            title: self.title,
            description: self.description,
            changes_summary: self.changes_summary,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    subject: Option<String>,
    grade_level: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}
impl LessonRecord {
    fn to_domain(self) -> Lesson {
        Lesson {
            id: self.id,
            title: self.title,
            description: self.description,
            subject: self.subject,
            grade_level: self.grade_level,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ComponentRecord {
    id: Uuid,
    lesson_id: Uuid,
    component_type: String,
    title: String,
    content: serde_json::Value,
    sort_order: i32,
    enabled: bool,
    is_assignable: bool,
    reading_level: Option<String>,
    language_code: Option<String>,
    read_aloud: bool,
}
impl ComponentRecord {
    fn to_domain(self) -> LessonComponent {
        let component_type = ComponentType::parse(&self.component_type);
        let content = LessonComponentContent::decode_stored(&component_type, self.content);
        LessonComponent {
            id: self.id,
            lesson_id: self.lesson_id,
            component_type,
            title: self.title,
            content,
            order: self.sort_order,
            enabled: self.enabled,
            is_assignable: self.is_assignable,
            reading_level: self.reading_level,
            language_code: self.language_code,
            read_aloud: self.read_aloud,
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    lesson_component_id: Option<Uuid>,
    title: String,
    time_limit_minutes: Option<i32>,
    attempts_allowed: Option<i32>,
    shuffle_questions: bool,
    shuffle_options: bool,
    pass_threshold: f64,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}
impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            lesson_component_id: self.lesson_component_id,
            title: self.title,
            time_limit_minutes: self.time_limit_minutes.map(to_u32),
            attempts_allowed: self.attempts_allowed.map(to_u32),
            shuffle_questions: self.shuffle_questions,
            shuffle_options: self.shuffle_options,
            pass_threshold: self.pass_threshold,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    quiz_id: Uuid,
    question_type: String,
    prompt: String,
    points: i32,
    position: i32,
    options: Json<Vec<QuizOption>>,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<QuizQuestion> {
        let question_type = QuestionType::parse(&self.question_type).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Question {} has unknown type '{}'",
                self.id, self.question_type
            ))
        })?;
        let mut options = self.options.0;
        options.sort_by_key(|o| o.position);
        Ok(QuizQuestion {
            id: self.id,
            quiz_id: self.quiz_id,
            question_type,
            prompt: self.prompt,
            points: to_u32(self.points),
            position: self.position,
            options,
        })
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: Uuid,
    quiz_id: Uuid,
    student_id: Uuid,
    status: String,
    answers: Json<BTreeMap<Uuid, Answer>>,
    question_order: Vec<Uuid>,
    results: Json<Vec<QuestionResult>>,
    score: i32,
    max_score: i32,
    percentage: f64,
    passed: bool,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}
impl AttemptRecord {
    fn to_domain(self) -> QuizAttempt {
        QuizAttempt {
            id: self.id,
            quiz_id: self.quiz_id,
            student_id: self.student_id,
            status: AttemptStatus::parse(&self.status).unwrap_or(AttemptStatus::InProgress),
            answers: self.answers.0,
            question_order: self.question_order,
            results: self.results.0,
            score: to_u32(self.score),
            max_score: to_u32(self.max_score),
            percentage: self.percentage,
            passed: self.passed,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ClassRecord {
    id: Uuid,
    name: String,
    teacher_id: Uuid,
    subject: Option<String>,
    grade_level: Option<String>,
    created_at: DateTime<Utc>,
}
impl ClassRecord {
    fn to_domain(self) -> Class {
        Class {
            id: self.id,
            name: self.name,
            teacher_id: self.teacher_id,
            subject: self.subject,
            grade_level: self.grade_level,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    class_id: Uuid,
    title: String,
    lesson_id: Option<Uuid>,
    quiz_id: Option<Uuid>,
    due_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl AssignmentRecord {
    fn to_domain(self) -> ClassAssignment {
        ClassAssignment {
            id: self.id,
            class_id: self.class_id,
            title: self.title,
            lesson_id: self.lesson_id,
            quiz_id: self.quiz_id,
            due_at: self.due_at,
            created_at: self.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, status, profile, created_at";
const CONTENT_COLUMNS: &str = "id, title, description, content_type, file_url, thumbnail_url, tags, subject, grade_level, is_published, version_number, created_at, created_by";
const COMPONENT_COLUMNS: &str = "id, lesson_id, component_type, title, content, sort_order, enabled, is_assignable, reading_level, language_code, read_aloud";
const QUIZ_COLUMNS: &str = "id, lesson_component_id, title, time_limit_minutes, attempts_allowed, shuffle_questions, shuffle_options, pass_threshold, created_by, created_at";
const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, status, answers, question_order, results, score, max_score, percentage, passed, started_at, submitted_at, updated_at";

//=========================================================================================
// `UserRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn create_user(&self, user: NewUserRecord) -> PortResult<User> {
        let role = user.profile.role();
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, hashed_password, first_name, last_name, role, status, profile) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(Json(&user.profile))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("A user with email {} already exists", user.email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, status FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User with email {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn list_users(&self, role: Option<Role>) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY last_name, first_name",
            USER_COLUMNS
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_user_status(&self, user_id: Uuid, status: UserStatus) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("User {} not found", user_id))
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
            .bind(hashed_password)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("User {} not found", user_id))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        // Sessions of deactivated users stop working immediately.
        sqlx::query_scalar::<_, Uuid>(
            "SELECT s.user_id FROM auth_sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW() AND u.status = 'active'",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `ContentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentRepository for DbAdapter {
    async fn create_content(&self, item: ContentItem) -> PortResult<ContentItem> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, ContentRecord>(&format!(
            "INSERT INTO content_items (id, title, description, content_type, file_url, thumbnail_url, tags, subject, grade_level, is_published, version_number, created_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {}",
            CONTENT_COLUMNS
        ))
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.content_type.as_str())
        .bind(&item.file_url)
        .bind(&item.thumbnail_url)
        .bind(&item.tags)
        .bind(&item.subject)
        .bind(&item.grade_level)
        .bind(item.is_published)
        .bind(item.version_number)
        .bind(item.created_at)
        .bind(item.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        // Version 1 is recorded alongside the item so history is never empty.
        sqlx::query(
            "INSERT INTO content_versions (id, content_id, version_number, title, description, changes_summary, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(item.id)
        .bind(item.version_number)
        .bind(&item.title)
        .bind(&item.description)
        .bind("Initial version")
        .bind(item.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_content(&self, content_id: Uuid) -> PortResult<ContentItem> {
        let record = sqlx::query_as::<_, ContentRecord>(&format!(
            "SELECT {} FROM content_items WHERE id = $1",
            CONTENT_COLUMNS
        ))
        .bind(content_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Content {} not found", content_id)))?;
        Ok(record.to_domain())
    }

    async fn list_content(&self) -> PortResult<Vec<ContentItem>> {
        let records = sqlx::query_as::<_, ContentRecord>(&format!(
            "SELECT {} FROM content_items ORDER BY created_at DESC",
            CONTENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_revision(&self, item: &ContentItem, version: &ContentVersion) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let result = sqlx::query(
            "UPDATE content_items SET title = $1, description = $2, content_type = $3, file_url = $4, \
             thumbnail_url = $5, tags = $6, subject = $7, grade_level = $8, version_number = $9 \
             WHERE id = $10",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.content_type.as_str())
        .bind(&item.file_url)
        .bind(&item.thumbnail_url)
        .bind(&item.tags)
        .bind(&item.subject)
        .bind(&item.grade_level)
        .bind(item.version_number)
        .bind(item.id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Content {} not found", item.id))?;

        sqlx::query(
            "INSERT INTO content_versions (id, content_id, version_number, title, description, changes_summary, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(version.id)
        .bind(version.content_id)
        .bind(version.version_number)
        .bind(&version.title)
        .bind(&version.description)
        .bind(&version.changes_summary)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(format!(
                "Version {} of content {} already exists",
                version.version_number, version.content_id
            )),
            _ => unexpected(e),
        })?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn set_published(&self, content_id: Uuid, is_published: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE content_items SET is_published = $1 WHERE id = $2")
            .bind(is_published)
            .bind(content_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Content {} not found", content_id))
    }

    async fn delete_content(&self, content_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Content {} not found", content_id))
    }

    async fn list_versions(&self, content_id: Uuid) -> PortResult<Vec<ContentVersion>> {
        let records = sqlx::query_as::<_, VersionRecord>(
            "SELECT id, content_id, version_number, title, description, changes_summary, created_at \
             FROM content_versions WHERE content_id = $1 ORDER BY version_number DESC",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `LessonRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LessonRepository for DbAdapter {
    async fn create_lesson(&self, lesson: Lesson) -> PortResult<Lesson> {
        let record = sqlx::query_as::<_, LessonRecord>(
            "INSERT INTO lessons (id, title, description, subject, grade_level, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, title, description, subject, grade_level, created_by, created_at",
        )
        .bind(lesson.id)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.subject)
        .bind(&lesson.grade_level)
        .bind(lesson.created_by)
        .bind(lesson.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        let record = sqlx::query_as::<_, LessonRecord>(
            "SELECT id, title, description, subject, grade_level, created_by, created_at \
             FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Lesson {} not found", lesson_id)))?;
        Ok(record.to_domain())
    }

    async fn list_lessons(&self) -> PortResult<Vec<Lesson>> {
        let records = sqlx::query_as::<_, LessonRecord>(
            "SELECT id, title, description, subject, grade_level, created_by, created_at \
             FROM lessons ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_components(&self, lesson_id: Uuid) -> PortResult<Vec<LessonComponent>> {
        let records = sqlx::query_as::<_, ComponentRecord>(&format!(
            "SELECT {} FROM lesson_components WHERE lesson_id = $1 ORDER BY sort_order ASC",
            COMPONENT_COLUMNS
        ))
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_component(&self, component_id: Uuid) -> PortResult<LessonComponent> {
        let record = sqlx::query_as::<_, ComponentRecord>(&format!(
            "SELECT {} FROM lesson_components WHERE id = $1",
            COMPONENT_COLUMNS
        ))
        .bind(component_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Component {} not found", component_id)))?;
        Ok(record.to_domain())
    }

    async fn save_component(&self, component: &LessonComponent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO lesson_components (id, lesson_id, component_type, title, content, sort_order, enabled, is_assignable, reading_level, language_code, read_aloud) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET component_type = EXCLUDED.component_type, title = EXCLUDED.title, \
             content = EXCLUDED.content, sort_order = EXCLUDED.sort_order, enabled = EXCLUDED.enabled, \
             is_assignable = EXCLUDED.is_assignable, reading_level = EXCLUDED.reading_level, \
             language_code = EXCLUDED.language_code, read_aloud = EXCLUDED.read_aloud",
        )
        .bind(component.id)
        .bind(component.lesson_id)
        .bind(component.component_type.as_str())
        .bind(&component.title)
        .bind(component.content.to_value())
        .bind(component.order)
        .bind(component.enabled)
        .bind(component.is_assignable)
        .bind(&component.reading_level)
        .bind(&component.language_code)
        .bind(component.read_aloud)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_component(&self, component_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM lesson_components WHERE id = $1")
            .bind(component_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Component {} not found", component_id))
    }

    async fn update_component_orders(&self, orders: &[(Uuid, i32)]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for (component_id, order) in orders {
            sqlx::query("UPDATE lesson_components SET sort_order = $1 WHERE id = $2")
                .bind(order)
                .bind(component_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `QuizRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizRepository for DbAdapter {
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(&format!(
            "INSERT INTO quizzes (id, lesson_component_id, title, time_limit_minutes, attempts_allowed, shuffle_questions, shuffle_options, pass_threshold, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            QUIZ_COLUMNS
        ))
        .bind(quiz.id)
        .bind(quiz.lesson_component_id)
        .bind(&quiz.title)
        .bind(quiz.time_limit_minutes.map(to_i32))
        .bind(quiz.attempts_allowed.map(to_i32))
        .bind(quiz.shuffle_questions)
        .bind(quiz.shuffle_options)
        .bind(quiz.pass_threshold)
        .bind(quiz.created_by)
        .bind(quiz.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Quiz {} not found", quiz_id)))?;
        Ok(record.to_domain())
    }

    async fn add_question(&self, question: QuizQuestion) -> PortResult<QuizQuestion> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "INSERT INTO quiz_questions (id, quiz_id, question_type, prompt, points, position, options) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, quiz_id, question_type, prompt, points, position, options",
        )
        .bind(question.id)
        .bind(question.quiz_id)
        .bind(question.question_type.as_str())
        .bind(&question.prompt)
        .bind(to_i32(question.points))
        .bind(question.position)
        .bind(Json(&question.options))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, quiz_id, question_type, prompt, points, position, options \
             FROM quiz_questions WHERE quiz_id = $1 ORDER BY position ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn count_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> PortResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND student_id = $2",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO quiz_attempts ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(attempt.status.as_str())
        .bind(Json(&attempt.answers))
        .bind(&attempt.question_order)
        .bind(Json(&attempt.results))
        .bind(to_i32(attempt.score))
        .bind(to_i32(attempt.max_score))
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.started_at)
        .bind(attempt.submitted_at)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> PortResult<QuizAttempt> {
        let record = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Attempt {} not found", attempt_id)))?;
        Ok(record.to_domain())
    }

    async fn save_attempt_answers(
        &self,
        attempt_id: Uuid,
        answers: &BTreeMap<Uuid, Answer>,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Finished attempts are never overwritten by a late autosave.
        sqlx::query(
            "UPDATE quiz_attempts SET answers = $1, updated_at = $2 \
             WHERE id = $3 AND status = 'in_progress'",
        )
        .bind(Json(answers))
        .bind(updated_at)
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn finalize_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE quiz_attempts SET status = $1, answers = $2, results = $3, score = $4, \
             max_score = $5, percentage = $6, passed = $7, submitted_at = $8, updated_at = $9 \
             WHERE id = $10",
        )
        .bind(attempt.status.as_str())
        .bind(Json(&attempt.answers))
        .bind(Json(&attempt.results))
        .bind(to_i32(attempt.score))
        .bind(to_i32(attempt.max_score))
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.submitted_at)
        .bind(attempt.updated_at)
        .bind(attempt.id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), format!("Attempt {} not found", attempt.id))
    }

    async fn list_attempts_for_quizzes(&self, quiz_ids: &[Uuid]) -> PortResult<Vec<QuizAttempt>> {
        if quiz_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {} FROM quiz_attempts WHERE quiz_id = ANY($1) ORDER BY started_at ASC",
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `ClassRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ClassRepository for DbAdapter {
    async fn create_class(&self, class: Class) -> PortResult<Class> {
        let record = sqlx::query_as::<_, ClassRecord>(
            "INSERT INTO classes (id, name, teacher_id, subject, grade_level, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, name, teacher_id, subject, grade_level, created_at",
        )
        .bind(class.id)
        .bind(&class.name)
        .bind(class.teacher_id)
        .bind(&class.subject)
        .bind(&class.grade_level)
        .bind(class.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_class(&self, class_id: Uuid) -> PortResult<Class> {
        let record = sqlx::query_as::<_, ClassRecord>(
            "SELECT id, name, teacher_id, subject, grade_level, created_at FROM classes WHERE id = $1",
        )
        .bind(class_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Class {} not found", class_id)))?;
        Ok(record.to_domain())
    }

    async fn list_classes_for_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<Class>> {
        let records = sqlx::query_as::<_, ClassRecord>(
            "SELECT id, name, teacher_id, subject, grade_level, created_at \
             FROM classes WHERE teacher_id = $1 ORDER BY name ASC",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_assignment(&self, assignment: ClassAssignment) -> PortResult<ClassAssignment> {
        let record = sqlx::query_as::<_, AssignmentRecord>(
            "INSERT INTO class_assignments (id, class_id, title, lesson_id, quiz_id, due_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, class_id, title, lesson_id, quiz_id, due_at, created_at",
        )
        .bind(assignment.id)
        .bind(assignment.class_id)
        .bind(&assignment.title)
        .bind(assignment.lesson_id)
        .bind(assignment.quiz_id)
        .bind(assignment.due_at)
        .bind(assignment.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_assignments(&self, class_id: Uuid) -> PortResult<Vec<ClassAssignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT id, class_id, title, lesson_id, quiz_id, due_at, created_at \
             FROM class_assignments WHERE class_id = $1 ORDER BY created_at ASC",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
