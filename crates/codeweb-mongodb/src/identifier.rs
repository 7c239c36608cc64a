//! `_id` handling between callers and the store.
//!
//! Callers only ever see identifiers as strings. Strings in filters are
//! parsed back into ObjectIds before a query runs, and ObjectIds in results
//! are rendered as hex strings.

use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use codeweb_common::{CodewebError, Result};

/// Reserved identifier field
pub const ID_FIELD: &str = "_id";

/// Parse an identifier string into an ObjectId.
pub fn parse_object_id(value: &str) -> Result<ObjectId> {
    ObjectId::parse_str(value).map_err(|e| CodewebError::Conversion {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Replace a string `_id` in `filter` with the ObjectId it spells.
///
/// Absent or non-string `_id` values are left alone.
pub fn normalize_id(filter: &mut BsonDocument) -> Result<()> {
    let oid = match filter.get(ID_FIELD) {
        Some(Bson::String(value)) => parse_object_id(value)?,
        _ => return Ok(()),
    };
    filter.insert(ID_FIELD, oid);
    Ok(())
}

/// Caller-facing string form of an identifier value.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a result document's `_id`, whatever its type, as a string.
///
/// ObjectIds become hex and null becomes `"null"`. Documents without an
/// `_id` are left alone.
pub fn stringify_id(document: &mut BsonDocument) {
    let rendered = match document.get(ID_FIELD) {
        None | Some(Bson::String(_)) => return,
        Some(id) => id_to_string(id),
    };
    document.insert(ID_FIELD, rendered);
}

/// Render a bare value returned by the store; ObjectIds become hex strings.
pub fn stringify_value(value: Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        other => other,
    }
}
