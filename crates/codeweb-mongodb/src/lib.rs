//! MongoDB data access for codeweb
//!
//! This crate provides the query-construction layer and the thin data-access
//! wrapper used by the HTTP server.
//!
//! # Features
//! - `field__operator` condition syntax translated to native filters
//! - String `_id` filters parsed into ObjectIds, ObjectIds returned as strings
//! - Find, aggregate, insert, update, delete, count and distinct
//! - One pooled connection shared by every request
//!
//! ```ignore
//! use bson::doc;
//! use codeweb_mongodb::{Connection, FindQuery, PoolConfig, SortDirection, Store};
//!
//! let connection = Connection::with_config("mongodb://localhost:27017", PoolConfig::default()).await?;
//! let store = Store::new(connection);
//!
//! let adults = store
//!     .find_many(
//!         "account",
//!         "user",
//!         FindQuery::new()
//!             .condition("age__gte", 18)
//!             .sort("name", SortDirection::Asc)
//!             .limit(20),
//!     )
//!     .await?;
//! ```

pub mod connection;
pub mod identifier;
pub mod operator;
pub mod query;
pub mod store;

pub use codeweb_common::{CodewebError, Result};
pub use connection::{Connection, PoolConfig};
pub use identifier::{id_to_string, normalize_id, parse_object_id, ID_FIELD};
pub use operator::{Operator, SEPARATOR};
pub use query::{build_query, merge_conditions, FindQuery, SortDirection};
pub use store::{Operation, Store};
