//! Question CRUD backed by `question.question`

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bson::{doc, Bson, Document as BsonDocument};
use codeweb_mongodb::{FindQuery, SortDirection, SEPARATOR};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    CollectionName, CreatedResponse, DatabaseName, Difficulty, DifficultyCount, Question,
    QuestionCreate, QuestionPage, QuestionUpdate,
};
use crate::state::AppState;

const DATABASE: DatabaseName = DatabaseName::Question;
const COLLECTION: CollectionName = CollectionName::Question;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Fields a listing may filter on
const FILTER_FIELDS: &[&str] = &["title", "content", "tags", "difficulty", "author_id"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/tags", get(list_tags))
        .route("/stats", get(difficulty_stats))
        .route(
            "/{id}",
            get(get_question).put(update_question).delete(delete_question),
        )
}

/// Pagination plus simplified conditions parsed from a query string
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: u64,
    pub page_size: u64,
    pub conditions: BsonDocument,
}

impl ListParams {
    /// `page` and `page_size` control paging; every other key must be a
    /// filterable field, optionally with an `__operator` suffix.
    pub fn parse(params: HashMap<String, String>) -> AppResult<Self> {
        let mut page = 1;
        let mut page_size = DEFAULT_PAGE_SIZE;
        let mut conditions = BsonDocument::new();

        let mut keys: Vec<_> = params.into_iter().collect();
        keys.sort();

        for (key, value) in keys {
            match key.as_str() {
                "page" => page = parse_number(&key, &value)?.max(1),
                "page_size" => page_size = parse_number(&key, &value)?.clamp(1, MAX_PAGE_SIZE),
                _ => {
                    let (field, operator) = match key.split_once(SEPARATOR) {
                        Some((field, operator)) => (field, Some(operator)),
                        None => (key.as_str(), None),
                    };
                    if !FILTER_FIELDS.contains(&field) {
                        return Err(AppError::BadRequest(format!(
                            "Cannot filter on '{}'",
                            field
                        )));
                    }
                    let value = condition_value(&key, operator, &value)?;
                    conditions.insert(key, value);
                }
            }
        }

        let params = Self {
            page,
            page_size,
            conditions,
        };
        if params.skip() > i64::MAX as u64 {
            return Err(AppError::BadRequest("'page' is out of range".to_string()));
        }
        Ok(params)
    }

    /// Documents to skip; saturates for page numbers past any real result
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

fn parse_number(key: &str, value: &str) -> AppResult<u64> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{}' must be a positive integer", key)))
}

/// Query-string values are strings; list operators take comma-separated values.
fn condition_value(key: &str, operator: Option<&str>, value: &str) -> AppResult<Bson> {
    let converted = match operator {
        Some("in" | "nin" | "all") => Bson::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Bson::from)
                .collect(),
        ),
        Some("exists") => Bson::Boolean(value.parse().map_err(|_| {
            AppError::BadRequest(format!("'{}' must be true or false", key))
        })?),
        Some("size") => Bson::Int64(value.parse().map_err(|_| {
            AppError::BadRequest(format!("'{}' must be an integer", key))
        })?),
        _ => Bson::from(value),
    };
    Ok(converted)
}

async fn create_question(
    State(state): State<AppState>,
    user: AuthUser,
    Json(question): Json<QuestionCreate>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    question.validate()?;

    let id = state
        .store
        .insert_one(
            DATABASE.as_str(),
            COLLECTION.as_str(),
            question.into_document(user.user_id()),
        )
        .await?;

    info!(question_id = %id, author_id = %user.user_id(), "question created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn list_questions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<QuestionPage>> {
    let params = ListParams::parse(params)?;

    let total = state
        .store
        .count(
            DATABASE.as_str(),
            COLLECTION.as_str(),
            BsonDocument::new(),
            params.conditions.clone(),
        )
        .await?;

    let query = FindQuery::new()
        .conditions(params.conditions.clone())
        .sort("created_at", SortDirection::Desc)
        .skip(params.skip())
        .limit(params.page_size as i64);
    let items = state
        .store
        .find_many(DATABASE.as_str(), COLLECTION.as_str(), query)
        .await?
        .into_iter()
        .map(Question::from_document)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(QuestionPage {
        items,
        total,
        page: params.page,
        page_size: params.page_size,
    }))
}

async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Question>> {
    let document = state
        .store
        .find_one(DATABASE.as_str(), COLLECTION.as_str(), doc! { "_id": id.as_str() })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("question {}", id)))?;

    Ok(Json(Question::from_document(document)?))
}

/// Filter selecting `id`, restricted to the caller's own questions unless staff
fn owned_filter(id: &str, user: &AuthUser) -> BsonDocument {
    let mut filter = doc! { "_id": id };
    if !user.is_staff() {
        filter.insert("author_id", user.user_id());
    }
    filter
}

async fn update_question(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<QuestionUpdate>,
) -> AppResult<Json<Question>> {
    let fields = update.into_set_document()?;

    let updated = state
        .store
        .update_one(
            DATABASE.as_str(),
            COLLECTION.as_str(),
            owned_filter(&id, &user),
            fields,
            false,
        )
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("question {}", id)));
    }

    get_question(State(state), Path(id)).await
}

async fn delete_question(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let deleted = state
        .store
        .delete_one(DATABASE.as_str(), COLLECTION.as_str(), owned_filter(&id, &user))
        .await?;

    if deleted {
        info!(question_id = %id, "question deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("question {}", id)))
    }
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let mut tags: Vec<String> = state
        .store
        .distinct(
            DATABASE.as_str(),
            COLLECTION.as_str(),
            "tags",
            BsonDocument::new(),
            BsonDocument::new(),
        )
        .await?
        .into_iter()
        .filter_map(|tag| match tag {
            Bson::String(tag) => Some(tag),
            _ => None,
        })
        .collect();
    tags.sort();

    Ok(Json(tags))
}

/// Questions stored without a difficulty count as the default one.
fn difficulty_pipeline() -> Vec<BsonDocument> {
    vec![
        doc! { "$group": {
            "_id": { "$ifNull": ["$difficulty", Difficulty::default().as_str()] },
            "count": { "$sum": 1 },
        } },
        doc! { "$sort": { "_id": 1 } },
    ]
}

fn difficulty_counts(groups: Vec<BsonDocument>) -> Vec<DifficultyCount> {
    groups
        .into_iter()
        .map(|group| DifficultyCount {
            difficulty: group.get_str("_id").unwrap_or_default().to_string(),
            count: match group.get("count") {
                Some(Bson::Int32(n)) => i64::from(*n),
                Some(Bson::Int64(n)) => *n,
                _ => 0,
            },
        })
        .collect()
}

async fn difficulty_stats(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DifficultyCount>>> {
    let groups = state
        .store
        .aggregate(DATABASE.as_str(), COLLECTION.as_str(), difficulty_pipeline())
        .await?;

    Ok(Json(difficulty_counts(groups)))
}
