use chrono::{DateTime, Utc};
use log::debug;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    error::Error as DbError,
    options::FindOneOptions,
    Client, Database,
};
use rocket::tokio::time::sleep;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::mongodb::{
    is_transient_transaction_error, Coll, Counter, CHOICE_ID_COUNTER, MAX_TRANSACTION_ATTEMPTS,
    POLL_ID_COUNTER, TRANSACTION_RETRY_BACKOFF,
};

use super::choice::Choice;

pub type PollId = u32;

/// A named contestant shown alongside the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    pub name: String,
    pub image: Option<String>,
}

impl Contestant {
    /// A contestant without an image.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
        }
    }
}

/// A poll from the database. Its choices live in their own collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: PollId,
    pub question: String,
    pub name: String,
    /// Stored file name of the banner image.
    pub image: Option<String>,
    pub contestants: [Contestant; 2],
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub question: String,
    pub name: String,
    pub image: Option<String>,
    pub contestants: [Contestant; 2],
    /// Raw choice texts, as submitted.
    pub choices: Vec<String>,
}

impl PollSpec {
    /// The choice texts that will actually be stored: trimmed, with blank ones dropped.
    pub fn choice_texts(&self) -> Vec<String> {
        self.choices
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Poll {
    /// The current poll: the one with the highest ID, if any poll exists.
    pub async fn latest(polls: &Coll<Poll>) -> Result<Option<Poll>, DbError> {
        let options = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
        polls.find_one(None, options).await
    }

    /// Create a poll and its choices in a single transaction.
    ///
    /// Concurrent creations conflict on the ID counters; the losing
    /// transaction is retried a bounded number of times.
    pub async fn create(
        client: &Client,
        db: &Database,
        spec: PollSpec,
    ) -> crate::error::Result<PollTally> {
        let texts = spec.choice_texts();
        let choice_count = u32::try_from(texts.len()).map_err(|_| Error::TooManyChoices)?;

        let mut attempt = 1;
        loop {
            match Self::try_create(client, db, &spec, &texts, choice_count).await {
                Err(err)
                    if is_transient_transaction_error(&err) && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    debug!("Poll creation conflicted (attempt {attempt}), retrying: {err}");
                    sleep(TRANSACTION_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return Ok(result?),
            }
        }
    }

    /// A single attempt at [`Poll::create`].
    async fn try_create(
        client: &Client,
        db: &Database,
        spec: &PollSpec,
        texts: &[String],
        choice_count: u32,
    ) -> Result<PollTally, DbError> {
        let polls = Coll::<Poll>::from_db(db);
        let choices = Coll::<Choice>::from_db(db);
        let counters = Coll::<Counter>::from_db(db);

        let mut session = client.start_session(None).await?;
        session.start_transaction(None).await?;

        let id = Counter::next_with_session(&counters, POLL_ID_COUNTER, &mut session).await?;
        let poll = Poll {
            id,
            question: spec.question.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            contestants: spec.contestants.clone(),
            created_at: Utc::now(),
        };
        polls
            .insert_one_with_session(&poll, None, &mut session)
            .await?;

        let first_choice_id =
            Counter::reserve_with_session(&counters, CHOICE_ID_COUNTER, choice_count, &mut session)
                .await?;
        let new_choices = texts
            .iter()
            .zip(first_choice_id..)
            .map(|(text, choice_id)| Choice {
                id: choice_id,
                poll_id: id,
                text: text.clone(),
                votes: 0,
            })
            .collect::<Vec<_>>();
        // `insert_many` rejects an empty batch.
        if !new_choices.is_empty() {
            choices
                .insert_many_with_session(&new_choices, None, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        Ok(PollTally {
            poll,
            choices: new_choices,
        })
    }
}

/// A poll together with its choices and their current tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTally {
    pub poll: Poll,
    pub choices: Vec<Choice>,
}

impl PollTally {
    /// Read the current tallies of a poll.
    pub async fn load(choices: &Coll<Choice>, poll: Poll) -> Result<PollTally, DbError> {
        let choices = Choice::for_poll(choices, poll.id).await?;
        Ok(PollTally { poll, choices })
    }

    /// Read the current tallies of the latest poll, if any.
    pub async fn latest(polls: &Coll<Poll>, choices: &Coll<Choice>) -> Result<Option<PollTally>, DbError> {
        match Poll::latest(polls).await? {
            Some(poll) => Ok(Some(PollTally::load(choices, poll).await?)),
            None => Ok(None),
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.choices.iter().map(|choice| choice.votes).sum()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use rocket::local::asynchronous::Client;

    #[test]
    fn blank_choices_are_dropped() {
        let spec = PollSpec::example(&["A", "", "  ", "B"]);
        assert_eq!(spec.choice_texts(), vec!["A", "B"]);

        let spec = PollSpec::example(&["  Dr. Maxamed ", "\tDr. Ayaanle\n"]);
        assert_eq!(spec.choice_texts(), vec!["Dr. Maxamed", "Dr. Ayaanle"]);
    }

    #[test]
    fn total_votes_sums_choices() {
        let poll = Poll::example(1);
        let choices = [(1, 3), (2, 4)]
            .into_iter()
            .map(|(id, votes)| Choice {
                id,
                poll_id: 1,
                text: format!("choice {id}"),
                votes,
            })
            .collect();
        let tally = PollTally { poll, choices };
        assert_eq!(tally.total_votes(), 7);
    }

    #[backend_test]
    async fn create_poll_stores_trimmed_choices(client: Client, db: Database, choices: Coll<Choice>) {
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        let spec = PollSpec::example(&["A", "", "  ", "B"]);
        let created = Poll::create(db_client, &db, spec).await.unwrap();

        let stored = Choice::for_poll(&choices, created.poll.id).await.unwrap();
        assert_eq!(stored, created.choices);
        let texts = stored.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["A", "B"]);
        assert!(stored.iter().all(|c| c.votes == 0 && c.poll_id == created.poll.id));
    }

    #[backend_test]
    async fn concurrent_creations_both_succeed(client: Client, db: Database, choices: Coll<Choice>) {
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        let (first, second) = rocket::futures::future::join(
            Poll::create(db_client, &db, PollSpec::example(&["A", "B"])),
            Poll::create(db_client, &db, PollSpec::example(&["C", "D"])),
        )
        .await;
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.poll.id, second.poll.id);

        // Choice IDs were reserved in disjoint blocks.
        for created in [&first, &second] {
            let stored = Choice::for_poll(&choices, created.poll.id).await.unwrap();
            assert_eq!(stored, created.choices);
        }
        assert_eq!(choices.count_documents(None, None).await.unwrap(), 4);
    }

    #[backend_test]
    async fn latest_poll_has_highest_id(client: Client, db: Database, polls: Coll<Poll>) {
        assert!(Poll::latest(&polls).await.unwrap().is_none());

        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let created = Poll::create(db_client, &db, PollSpec::example(&["A"]))
                .await
                .unwrap();
            ids.push(created.poll.id);
        }
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        let latest = Poll::latest(&polls).await.unwrap().unwrap();
        assert_eq!(latest.id, *ids.iter().max().unwrap());
    }
}
