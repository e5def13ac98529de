use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    ClientSession,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Coll;

use super::poll::{Poll, PollId};

pub type ChoiceId = u32;

/// One selectable option of a poll, with its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "_id")]
    pub id: ChoiceId,
    pub poll_id: PollId,
    pub text: String,
    #[serde(default)]
    pub votes: u32,
}

impl Choice {
    /// Does this choice belong to the given poll?
    pub fn belongs_to(&self, poll: &Poll) -> bool {
        self.poll_id == poll.id
    }

    pub async fn find(choices: &Coll<Choice>, id: ChoiceId) -> Result<Option<Choice>, DbError> {
        choices.find_one(doc! { "_id": id }, None).await
    }

    /// All choices of a poll, in creation order.
    pub async fn for_poll(choices: &Coll<Choice>, poll_id: PollId) -> Result<Vec<Choice>, DbError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        choices
            .find(doc! { "poll_id": poll_id }, options)
            .await?
            .try_collect()
            .await
    }

    /// Atomically add one vote to the choice, as part of the session's transaction.
    ///
    /// The update only applies if the choice belongs to `poll_id`; otherwise
    /// nothing is changed and `None` is returned.
    pub async fn increment_votes_with_session(
        choices: &Coll<Choice>,
        id: ChoiceId,
        poll_id: PollId,
        session: &mut ClientSession,
    ) -> Result<Option<Choice>, DbError> {
        let filter = doc! {
            "_id": id,
            "poll_id": poll_id,
        };
        let update = doc! {
            "$inc": { "votes": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        choices
            .find_one_and_update_with_session(filter, update, options, session)
            .await
    }
}
