//! Query translation and the find-query builder
//!
//! Simplified conditions are written as `field__operator` keys in a
//! [`BsonDocument`], for example `doc! { "email__eq": "a@x.com", "age__gt": 18 }`.
//! [`build_query`] turns them into a native MongoDB filter.

use bson::{Bson, Document as BsonDocument};
use mongodb::options::FindOptions;

use crate::operator::{Operator, SEPARATOR};

/// Translate simplified conditions into a native filter document.
///
/// Keys are split at the first `__`. A recognized operator suffix produces
/// the operator's clause under the field name; an unrecognized suffix drops
/// the condition. Keys without a separator are plain equality on the key.
pub fn build_query(conditions: &BsonDocument) -> BsonDocument {
    let mut query = BsonDocument::new();

    for (key, value) in conditions {
        match key.split_once(SEPARATOR) {
            Some((field, name)) => {
                if let Some(op) = Operator::from_name(name) {
                    query.insert(field, op.apply(value.clone()));
                } else {
                    tracing::debug!(condition = %key, "dropping condition with unknown operator");
                }
            }
            None => {
                query.insert(key.as_str(), value.clone());
            }
        }
    }

    query
}

/// Merge translated `conditions` into a raw `filter`.
///
/// Raw entries keep their position; on a key collision the clause built from
/// the simplified condition replaces the raw value.
pub fn merge_conditions(mut filter: BsonDocument, conditions: &BsonDocument) -> BsonDocument {
    if conditions.is_empty() {
        return filter;
    }
    for (field, clause) in build_query(conditions) {
        filter.insert(field, clause);
    }
    filter
}

/// Sort direction for a single sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (1)
    Asc,
    /// Descending order (-1)
    Desc,
}

impl SortDirection {
    /// Returns the MongoDB sort value.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Builder for find-many queries
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    filter: BsonDocument,
    conditions: BsonDocument,
    projection: Option<BsonDocument>,
    sort: Vec<(String, SortDirection)>,
    skip: Option<u64>,
    limit: Option<i64>,
}

impl FindQuery {
    /// Create an empty query matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw filter document
    pub fn filter(mut self, filter: BsonDocument) -> Self {
        self.filter = filter;
        self
    }

    /// Add one simplified condition, e.g. `condition("age__gte", 18)`
    pub fn condition(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Replace all simplified conditions
    pub fn conditions(mut self, conditions: BsonDocument) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the projection document
    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Append a sort key; keys apply in the order they are added
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    /// Set the number of documents to skip (0 means no skip)
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the maximum number of documents to return (0 means no limit)
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Get the raw filter document
    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    /// Get the simplified conditions
    pub fn get_conditions(&self) -> &BsonDocument {
        &self.conditions
    }

    /// Get the skip value
    pub fn get_skip(&self) -> Option<u64> {
        self.skip
    }

    /// Get the limit value
    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// The filter actually sent to the server: raw filter merged with the
    /// translated conditions. Identifier normalization happens later.
    pub fn effective_filter(&self) -> BsonDocument {
        merge_conditions(self.filter.clone(), &self.conditions)
    }

    /// The sort document, or `None` when no sort keys were given
    pub fn sort_document(&self) -> Option<BsonDocument> {
        if self.sort.is_empty() {
            return None;
        }
        let mut sort = BsonDocument::new();
        for (field, direction) in &self.sort {
            sort.insert(field.as_str(), direction.as_i32());
        }
        Some(sort)
    }

    /// Driver options for this query.
    ///
    /// Zero skip or limit counts as unset, and an empty projection returns
    /// whole documents.
    pub fn find_options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.sort = self.sort_document();
        options.skip = self.skip.filter(|skip| *skip > 0);
        options.limit = self.limit.filter(|limit| *limit != 0);
        options.projection = self.projection.clone().filter(|p| !p.is_empty());
        options
    }
}
