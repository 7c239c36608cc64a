//! Document access operations
//!
//! [`Store`] is the thin data-access layer used by request handlers. Every
//! operation takes a database and collection name, translates simplified
//! conditions, normalizes string `_id` filters, runs against the driver and
//! hands identifiers back as strings.

use std::future::IntoFuture;
use std::pin::pin;
use std::time::Duration;

use bson::{doc, Bson, Document as BsonDocument};
use codeweb_common::{CodewebError, Result};
use futures::{Stream, TryStreamExt};
use mongodb::options::UpdateOptions;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::identifier::{id_to_string, normalize_id, stringify_id, stringify_value};
use crate::query::{merge_conditions, FindQuery};

/// Names of the store operations, used in logs and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    Aggregate,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    Count,
    Distinct,
}

impl Operation {
    /// Returns the operation name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::Aggregate => "aggregate",
            Operation::InsertOne => "insert_one",
            Operation::InsertMany => "insert_many",
            Operation::UpdateOne => "update_one",
            Operation::UpdateMany => "update_many",
            Operation::DeleteOne => "delete_one",
            Operation::DeleteMany => "delete_many",
            Operation::Count => "count",
            Operation::Distinct => "distinct",
        }
    }

    /// Whether the operation changes stored documents
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::InsertOne
                | Operation::InsertMany
                | Operation::UpdateOne
                | Operation::UpdateMany
                | Operation::DeleteOne
                | Operation::DeleteMany
        )
    }
}

/// Why draining a cursor stopped early
#[derive(Debug, PartialEq)]
enum DrainError<E> {
    Failed(E),
    TimedOut,
}

/// Collect every item of `stream`, giving each item its own `deadline`.
///
/// A cursor fetches a new batch only when its buffer runs dry, so the
/// deadline bounds each round trip rather than the whole result set.
async fn drain<S, T, E>(
    stream: S,
    deadline: Duration,
) -> std::result::Result<Vec<T>, DrainError<E>>
where
    S: Stream<Item = std::result::Result<T, E>>,
{
    let mut stream = pin!(stream);
    let mut items = Vec::new();
    loop {
        match tokio::time::timeout(deadline, stream.try_next()).await {
            Ok(Ok(Some(item))) => items.push(item),
            Ok(Ok(None)) => return Ok(items),
            Ok(Err(e)) => return Err(DrainError::Failed(e)),
            Err(_) => return Err(DrainError::TimedOut),
        }
    }
}

/// Data-access wrapper over a shared [`Connection`]
#[derive(Debug, Clone)]
pub struct Store {
    connection: Connection,
}

impl Store {
    /// Create a store over an established connection
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Find all documents matching `query`.
    ///
    /// Sort, skip and limit are applied by the server in that order.
    pub async fn find_many(
        &self,
        database: &str,
        collection: &str,
        query: FindQuery,
    ) -> Result<Vec<BsonDocument>> {
        let mut filter = query.effective_filter();
        normalize_id(&mut filter)?;
        let options = query.find_options();
        debug!(database, collection, filter = %filter, "find");

        let coll = self.connection.get_collection(database, collection);
        let cursor = self
            .run(
                Operation::Find,
                database,
                collection,
                coll.find(filter).with_options(options),
            )
            .await?;
        let mut documents = self.collect(Operation::Find, database, collection, cursor).await?;

        documents.iter_mut().for_each(stringify_id);
        Ok(documents)
    }

    /// Find the first document matching a raw filter
    pub async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
    ) -> Result<Option<BsonDocument>> {
        let documents = self
            .find_many(database, collection, FindQuery::new().filter(filter).limit(1))
            .await?;
        Ok(documents.into_iter().next())
    }

    /// Run an aggregation pipeline. The pipeline is passed through untouched.
    pub async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>> {
        debug!(database, collection, stages = pipeline.len(), "aggregate");

        let coll = self.connection.get_collection(database, collection);
        let cursor = self
            .run(Operation::Aggregate, database, collection, coll.aggregate(pipeline))
            .await?;
        let mut documents = self
            .collect(Operation::Aggregate, database, collection, cursor)
            .await?;

        documents.iter_mut().for_each(stringify_id);
        Ok(documents)
    }

    /// Insert one document and return its identifier
    pub async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: BsonDocument,
    ) -> Result<String> {
        debug!(database, collection, "insert_one");

        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(Operation::InsertOne, database, collection, coll.insert_one(document))
            .await?;

        Ok(id_to_string(&result.inserted_id))
    }

    /// Insert several documents and return their identifiers in input order.
    ///
    /// An empty input returns an empty list without contacting the server.
    pub async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let count = documents.len();
        debug!(database, collection, count, "insert_many");

        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(Operation::InsertMany, database, collection, coll.insert_many(documents))
            .await?;

        (0..count)
            .map(|index| {
                result
                    .inserted_ids
                    .get(&index)
                    .map(id_to_string)
                    .ok_or_else(|| {
                        CodewebError::Internal(format!(
                            "insert_many in {}.{} returned no id for document {}",
                            database, collection, index
                        ))
                    })
            })
            .collect()
    }

    /// Set `update` fields on the first document matching `filter`.
    ///
    /// Returns true if a document was modified, or inserted when `upsert` is
    /// enabled and nothing matched.
    pub async fn update_one(
        &self,
        database: &str,
        collection: &str,
        mut filter: BsonDocument,
        update: BsonDocument,
        upsert: bool,
    ) -> Result<bool> {
        normalize_id(&mut filter)?;
        debug!(database, collection, filter = %filter, upsert, "update_one");

        let options = UpdateOptions::builder().upsert(upsert).build();
        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(
                Operation::UpdateOne,
                database,
                collection,
                coll.update_one(filter, doc! { "$set": update }).with_options(options),
            )
            .await?;

        Ok(result.modified_count > 0 || result.upserted_id.is_some())
    }

    /// Set `update` fields on every document matching `filter`.
    ///
    /// Returns the number of modified documents.
    pub async fn update_many(
        &self,
        database: &str,
        collection: &str,
        mut filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<u64> {
        normalize_id(&mut filter)?;
        debug!(database, collection, filter = %filter, "update_many");

        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(
                Operation::UpdateMany,
                database,
                collection,
                coll.update_many(filter, doc! { "$set": update }),
            )
            .await?;

        Ok(result.modified_count)
    }

    /// Delete the first document matching `filter`.
    ///
    /// Returns true iff one document was removed.
    pub async fn delete_one(
        &self,
        database: &str,
        collection: &str,
        mut filter: BsonDocument,
    ) -> Result<bool> {
        normalize_id(&mut filter)?;
        debug!(database, collection, filter = %filter, "delete_one");

        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(Operation::DeleteOne, database, collection, coll.delete_one(filter))
            .await?;

        Ok(result.deleted_count == 1)
    }

    /// Delete every document matching `filter` and return how many were removed
    pub async fn delete_many(
        &self,
        database: &str,
        collection: &str,
        mut filter: BsonDocument,
    ) -> Result<u64> {
        normalize_id(&mut filter)?;
        debug!(database, collection, filter = %filter, "delete_many");

        let coll = self.connection.get_collection(database, collection);
        let result = self
            .run(Operation::DeleteMany, database, collection, coll.delete_many(filter))
            .await?;

        Ok(result.deleted_count)
    }

    /// Count documents matching `filter` merged with `conditions`
    pub async fn count(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        conditions: BsonDocument,
    ) -> Result<u64> {
        let mut filter = merge_conditions(filter, &conditions);
        normalize_id(&mut filter)?;
        debug!(database, collection, filter = %filter, "count");

        let coll = self.connection.get_collection(database, collection);
        self.run(Operation::Count, database, collection, coll.count_documents(filter))
            .await
    }

    /// Distinct values of `field` among documents matching `filter` merged
    /// with `conditions`. ObjectId values come back as hex strings.
    pub async fn distinct(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        filter: BsonDocument,
        conditions: BsonDocument,
    ) -> Result<Vec<Bson>> {
        let mut filter = merge_conditions(filter, &conditions);
        normalize_id(&mut filter)?;
        debug!(database, collection, field, filter = %filter, "distinct");

        let coll = self.connection.get_collection(database, collection);
        let values = self
            .run(Operation::Distinct, database, collection, coll.distinct(field, filter))
            .await?;

        Ok(values.into_iter().map(stringify_value).collect())
    }

    /// Await one driver call under the socket timeout and wrap its failure
    /// with the operation context.
    async fn run<T, F>(
        &self,
        operation: Operation,
        database: &str,
        collection: &str,
        call: F,
    ) -> Result<T>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        match tokio::time::timeout(self.deadline(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.failed(operation, database, collection, e)),
            Err(_) => Err(self.timed_out(operation, database, collection)),
        }
    }

    /// Drain a result cursor, each batch fetch under its own socket timeout
    async fn collect<S>(
        &self,
        operation: Operation,
        database: &str,
        collection: &str,
        cursor: S,
    ) -> Result<Vec<BsonDocument>>
    where
        S: Stream<Item = mongodb::error::Result<BsonDocument>>,
    {
        drain(cursor, self.deadline())
            .await
            .map_err(|e| match e {
                DrainError::Failed(e) => self.failed(operation, database, collection, e),
                DrainError::TimedOut => self.timed_out(operation, database, collection),
            })
    }

    fn deadline(&self) -> Duration {
        self.connection.config().socket_timeout
    }

    fn failed(
        &self,
        operation: Operation,
        database: &str,
        collection: &str,
        e: mongodb::error::Error,
    ) -> CodewebError {
        warn!(
            operation = operation.as_str(),
            database,
            collection,
            error = %e,
            "store operation failed"
        );
        CodewebError::from_store(operation.as_str(), database, collection, e)
    }

    /// A timed-out write was sent and may still have been applied.
    fn timed_out(&self, operation: Operation, database: &str, collection: &str) -> CodewebError {
        warn!(operation = operation.as_str(), database, collection, "store operation timed out");
        timeout_error(operation, database, collection, self.deadline())
    }
}

fn timeout_error(
    operation: Operation,
    database: &str,
    collection: &str,
    deadline: Duration,
) -> CodewebError {
    let outcome = if operation.is_write() {
        "; the write may have been applied"
    } else {
        ""
    };
    CodewebError::Connection(format!(
        "{} in {}.{} timed out after {:?}{}",
        operation.as_str(),
        database,
        collection,
        deadline,
        outcome
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Find.as_str(), "find");
        assert_eq!(Operation::InsertMany.as_str(), "insert_many");
        assert_eq!(Operation::UpdateOne.as_str(), "update_one");
        assert_eq!(Operation::DeleteMany.as_str(), "delete_many");
        assert_eq!(Operation::Distinct.as_str(), "distinct");
    }

    #[test]
    fn test_write_operations() {
        assert!(Operation::InsertOne.is_write());
        assert!(Operation::UpdateMany.is_write());
        assert!(Operation::DeleteOne.is_write());
        assert!(!Operation::Find.is_write());
        assert!(!Operation::Count.is_write());
        assert!(!Operation::Distinct.is_write());
    }

    #[test]
    fn test_timeout_error_mentions_possible_write() {
        let deadline = Duration::from_secs(5);
        let write = timeout_error(Operation::InsertOne, "account", "user", deadline);
        assert!(write.is_connection());
        assert!(write.to_string().contains("the write may have been applied"));

        let read = timeout_error(Operation::Find, "account", "user", deadline);
        assert!(read.is_connection());
        assert!(!read.to_string().contains("write"));
    }

    fn delayed(count: u32, delay: Duration) -> impl Stream<Item = std::result::Result<u32, String>> {
        futures::stream::iter(0..count).then(move |n| async move {
            tokio::time::sleep(delay).await;
            Ok(n)
        })
    }

    #[tokio::test]
    async fn test_drain_deadline_applies_per_item() {
        // total time exceeds the deadline, each item is well within it
        let items = drain(delayed(4, Duration::from_millis(40)), Duration::from_millis(150))
            .await
            .unwrap();
        assert_eq!(items, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_slow_item_times_out() {
        let result = drain(delayed(2, Duration::from_millis(300)), Duration::from_millis(50)).await;
        assert_eq!(result, Err(DrainError::TimedOut));
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_failure() {
        let stream = futures::stream::iter(vec![Ok(1), Err("boom".to_string()), Ok(3)]);
        let result = drain(stream, Duration::from_secs(1)).await;
        assert_eq!(result, Err(DrainError::Failed("boom".to_string())));
    }
}
