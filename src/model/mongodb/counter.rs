use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use super::Coll;

/// Counter that hands out poll IDs.
pub const POLL_ID_COUNTER: &str = "poll_id";
/// Counter that hands out choice IDs.
pub const CHOICE_ID_COUNTER: &str = "choice_id";

/// The first ID handed out by a fresh counter.
const FIRST_ID: u32 = 1;

/// A named counter used to implement auto-increment IDs.
///
/// `next` is always the lowest ID not yet handed out, so IDs from one counter
/// are strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub name: String,
    pub next: u32,
}

impl Counter {
    /// Atomically reserve `count` consecutive IDs from the named counter as
    /// part of the given session's transaction, returning the first of them.
    pub async fn reserve_with_session(
        counters: &Coll<Counter>,
        name: &str,
        count: u32,
        session: &mut ClientSession,
    ) -> Result<u32, DbError> {
        let update = doc! {
            "$inc": { "next": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .upsert(true)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! { "_id": name }, update, options, session)
            .await?;
        // With `upsert` and `ReturnDocument::After` the counter is always returned;
        // a counter created by this call started from zero.
        Ok(counter.map_or(0, |counter| counter.next - count))
    }

    /// Reserve a single ID.
    pub async fn next_with_session(
        counters: &Coll<Counter>,
        name: &str,
        session: &mut ClientSession,
    ) -> Result<u32, DbError> {
        Self::reserve_with_session(counters, name, 1, session).await
    }
}

/// Ensure every ID counter exists, without disturbing counters that already do.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<(), DbError> {
    debug!("Ensuring ID counters exist");
    let upsert = UpdateOptions::builder().upsert(true).build();
    for name in [POLL_ID_COUNTER, CHOICE_ID_COUNTER] {
        let update = doc! {
            "$setOnInsert": { "next": FIRST_ID }
        };
        counters
            .update_one(doc! { "_id": name }, update, upsert.clone())
            .await?;
    }
    Ok(())
}
