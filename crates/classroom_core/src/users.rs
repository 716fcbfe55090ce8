//! crates/classroom_core/src/users.rs
//!
//! User administration rules: the create-user form, field validation and the
//! mapping from a flat form onto the role-specific profile.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::domain::{Role, RoleProfile};

pub const MIN_PASSWORD_LEN: usize = 8;

/// A field-level validation failure shown inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email.trim()))
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

/// The flat create-user form. Only the optional fields relevant to `role`
/// end up in the stored profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserForm {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub grade_level: Option<String>,
    pub class_ids: Vec<Uuid>,
    pub district: Option<String>,
    pub subject_areas: Vec<String>,
    pub admin_type: Option<String>,
    pub organization: Option<String>,
}

/// A validated user ready to be hashed and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: RoleProfile,
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl UserForm {
    pub fn validate(self) -> Result<NewUser, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            errors.push(ValidationError::new("email", "Email is required"));
        } else if !is_valid_email(&email) {
            errors.push(ValidationError::new("email", "Email address is not valid"));
        }
        if let Err(e) = validate_password(&self.password) {
            errors.push(e);
        }
        let first_name = self.first_name.trim().to_string();
        if first_name.is_empty() {
            errors.push(ValidationError::new("first_name", "First name is required"));
        }
        let last_name = self.last_name.trim().to_string();
        if last_name.is_empty() {
            errors.push(ValidationError::new("last_name", "Last name is required"));
        }
        let role = Role::parse(self.role.trim());
        if role.is_none() {
            errors.push(ValidationError::new(
                "role",
                "Role must be one of student, teacher, admin, developer",
            ));
        }

        let Some(role) = role.filter(|_| errors.is_empty()) else {
            return Err(errors);
        };

        let profile = match role {
            Role::Student => RoleProfile::Student {
                grade_level: clean(self.grade_level),
                class_ids: self.class_ids,
            },
            Role::Teacher => RoleProfile::Teacher {
                district: clean(self.district),
                subject_areas: self
                    .subject_areas
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            Role::Admin => RoleProfile::Admin {
                admin_type: clean(self.admin_type),
                organization: clean(self.organization),
            },
            Role::Developer => RoleProfile::Developer {
                organization: clean(self.organization),
            },
        };

        Ok(NewUser {
            email,
            password: self.password,
            first_name,
            last_name,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher_form() -> UserForm {
        UserForm {
            email: " Ada@School.org ".to_string(),
            password: "correct horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: "teacher".to_string(),
            district: Some("North".to_string()),
            subject_areas: vec!["Math".into(), " ".into()],
            grade_level: Some("7".to_string()),
            ..UserForm::default()
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("student@example.com"));
        assert!(!is_valid_email("student@example"));
        assert!(!is_valid_email("no spaces@example.com"));
    }

    #[test]
    fn role_selects_profile_fields() {
        let user = teacher_form().validate().unwrap();
        assert_eq!(user.email, "ada@school.org");
        assert_eq!(
            user.profile,
            RoleProfile::Teacher {
                district: Some("North".to_string()),
                subject_areas: vec!["Math".to_string()],
            }
        );
    }

    #[test]
    fn validation_collects_all_errors() {
        let form = UserForm {
            email: "nope".to_string(),
            password: "short".to_string(),
            role: "principal".to_string(),
            ..UserForm::default()
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "first_name", "last_name", "role"]);
    }
}
