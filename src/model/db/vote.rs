use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    error::Error as DbError,
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{is_duplicate_key_error, Coll, Id};

use super::poll::PollId;

/// An entry in the vote ledger: the fact that a user voted in a poll.
///
/// The pair `(user_id, poll_id)` is unique, enforced by an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    pub user_id: Id,
    pub poll_id: PollId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(user_id: Id, poll_id: PollId) -> Self {
        Self {
            id: Id::new(),
            user_id,
            poll_id,
            voted_at: Utc::now(),
        }
    }

    pub async fn has_voted(
        votes: &Coll<VoteRecord>,
        user_id: Id,
        poll_id: PollId,
    ) -> std::result::Result<bool, DbError> {
        let filter = doc! {
            "user_id": user_id,
            "poll_id": poll_id,
        };
        Ok(votes.find_one(filter, None).await?.is_some())
    }

    /// Record that the user voted in the poll, as part of the session's transaction.
    ///
    /// Fails with [`Error::DuplicateVote`] if the ledger already has this pair.
    pub async fn record_with_session(
        votes: &Coll<VoteRecord>,
        user_id: Id,
        poll_id: PollId,
        session: &mut ClientSession,
    ) -> Result<VoteRecord> {
        let record = VoteRecord::new(user_id, poll_id);
        votes
            .insert_one_with_session(&record, None, session)
            .await
            .map_err(|err: DbError| {
                if is_duplicate_key_error(&err) {
                    Error::DuplicateVote
                } else {
                    err.into()
                }
            })?;
        Ok(record)
    }
}
