//! Request/response models and the fixed database/collection names

use bson::{doc, Document as BsonDocument};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Pending => "pending",
            UserStatus::Banned => "banned",
        }
    }

    /// Whether an account in this status may log in
    pub fn can_login(&self) -> bool {
        matches!(self, UserStatus::Active | UserStatus::Pending)
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::User => "user",
        }
    }
}

/// Databases used by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseName {
    Account,
    Question,
    Answer,
    Review,
    Report,
}

impl DatabaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseName::Account => "account",
            DatabaseName::Question => "question",
            DatabaseName::Answer => "answer",
            DatabaseName::Review => "review",
            DatabaseName::Report => "report",
        }
    }
}

/// Collections used by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionName {
    User,
    Question,
    Answer,
    Review,
    Report,
}

impl CollectionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::User => "user",
            CollectionName::Question => "question",
            CollectionName::Answer => "answer",
            CollectionName::Review => "review",
            CollectionName::Report => "report",
        }
    }
}

// =====================
// Accounts
// =====================

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub phone: Option<String>,
}

impl UserCreate {
    /// Field constraints: name 2..=50 chars, well-formed email, password >= 6 chars
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();

        let name_len = self.name.chars().count();
        if !(2..=50).contains(&name_len) {
            problems.push("name must be between 2 and 50 characters");
        }
        if !EMAIL_REGEX.is_match(&self.email) {
            problems.push("email is not a valid email address");
        }
        if self.password.chars().count() < 6 {
            problems.push("password must be at least 6 characters");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }

    /// Document stored in `account.user`. `password_hash` replaces the raw password.
    pub fn into_document(self, password_hash: String) -> BsonDocument {
        let now = bson::DateTime::now();
        doc! {
            "name": self.name,
            "email": self.email,
            "password": password_hash,
            "role": self.role.as_str(),
            "status": self.status.as_str(),
            "avatar": self.avatar,
            "phone": self.phone,
            "created_at": now,
            "updated_at": now,
        }
    }
}

/// Login payload
#[derive(Debug, Clone, Deserialize)]
pub struct UserLogin {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =====================
// Questions
// =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Question creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionCreate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl QuestionCreate {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("content cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn into_document(self, author_id: &str) -> BsonDocument {
        let now = bson::DateTime::now();
        doc! {
            "title": self.title,
            "content": self.content,
            "tags": self.tags,
            "difficulty": self.difficulty.as_str(),
            "author_id": author_id,
            "created_at": now,
            "updated_at": now,
        }
    }
}

/// Partial question update; only the given fields are set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionUpdate {
    /// Fields for `$set`, including a fresh `updated_at`.
    pub fn into_set_document(self) -> Result<BsonDocument, AppError> {
        let mut fields = BsonDocument::new();
        if let Some(title) = self.title {
            fields.insert("title", title);
        }
        if let Some(content) = self.content {
            fields.insert("content", content);
        }
        if let Some(tags) = self.tags {
            fields.insert("tags", tags);
        }
        if let Some(difficulty) = self.difficulty {
            fields.insert("difficulty", difficulty.as_str());
        }
        if fields.is_empty() {
            return Err(AppError::Validation("no fields to update".to_string()));
        }
        fields.insert("updated_at", bson::DateTime::now());
        Ok(fields)
    }
}

/// Question as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename(deserialize = "_id"))]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub author_id: String,
    #[serde(deserialize_with = "bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn from_document(document: BsonDocument) -> Result<Self, AppError> {
        bson::from_document(document).map_err(|e| AppError::Store(e.into()))
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionPage {
    pub items: Vec<Question>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DifficultyCount {
    pub difficulty: String,
    pub count: i64,
}
