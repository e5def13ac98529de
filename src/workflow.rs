//! Casting a vote in the latest poll.

use log::{debug, info, warn};
use mongodb::{Client, ClientSession, Database};
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};
use crate::model::{
    db::{Choice, ChoiceId, Poll, PollTally, VoteRecord},
    mongodb::{
        is_transient_transaction_error, is_unknown_commit_result, Coll, Id,
        MAX_TRANSACTION_ATTEMPTS, TRANSACTION_RETRY_BACKOFF,
    },
};

/// How a vote submission ended, with the poll's tallies afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was counted.
    Voted(PollTally),
    /// The user had already voted in this poll; nothing changed.
    AlreadyVoted(PollTally),
}

impl VoteOutcome {
    pub fn tally(&self) -> &PollTally {
        match self {
            Self::Voted(tally) | Self::AlreadyVoted(tally) => tally,
        }
    }
}

/// Vote for `choice_id` in the latest poll on behalf of `user_id`.
///
/// A user who has already voted in the latest poll gets
/// [`VoteOutcome::AlreadyVoted`] and the tallies are left as they are. Fails
/// with [`Error::NoActivePoll`] if there is no poll, and [`Error::InvalidChoice`]
/// if the choice is missing or belongs to another poll.
pub async fn submit_vote(
    client: &Client,
    db: &Database,
    user_id: Id,
    choice_id: Option<ChoiceId>,
) -> Result<VoteOutcome> {
    let mut attempt = 1;
    loop {
        match try_submit_vote(client, db, user_id, choice_id).await {
            Err(Error::Db(err)) if is_transient_transaction_error(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                debug!("Vote by {user_id} conflicted (attempt {attempt}), retrying: {err}");
                sleep(TRANSACTION_RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// A single attempt at [`submit_vote`].
async fn try_submit_vote(
    client: &Client,
    db: &Database,
    user_id: Id,
    choice_id: Option<ChoiceId>,
) -> Result<VoteOutcome> {
    let polls = Coll::<Poll>::from_db(db);
    let choices = Coll::<Choice>::from_db(db);
    let votes = Coll::<VoteRecord>::from_db(db);

    let poll = Poll::latest(&polls).await?.ok_or(Error::NoActivePoll)?;

    if VoteRecord::has_voted(&votes, user_id, poll.id).await? {
        info!("User {user_id} already voted in poll {}", poll.id);
        return Ok(VoteOutcome::AlreadyVoted(PollTally::load(&choices, poll).await?));
    }

    let choice_id = choice_id.ok_or(Error::InvalidChoice)?;
    let choice = Choice::find(&choices, choice_id)
        .await?
        .filter(|choice| choice.belongs_to(&poll))
        .ok_or_else(|| {
            warn!("User {user_id} picked choice {choice_id}, which is not in poll {}", poll.id);
            Error::InvalidChoice
        })?;

    let mut session = client.start_session(None).await?;
    session.start_transaction(None).await?;

    let incremented =
        Choice::increment_votes_with_session(&choices, choice.id, poll.id, &mut session).await?;
    if incremented.is_none() {
        abort(&mut session).await;
        return Err(Error::InvalidChoice);
    }

    match VoteRecord::record_with_session(&votes, user_id, poll.id, &mut session).await {
        Ok(_) => {}
        Err(Error::DuplicateVote) => {
            abort(&mut session).await;
            info!("User {user_id} already voted in poll {}", poll.id);
            return Ok(VoteOutcome::AlreadyVoted(PollTally::load(&choices, poll).await?));
        }
        Err(err) => {
            abort(&mut session).await;
            return Err(err);
        }
    }

    commit(&mut session).await?;
    info!("User {user_id} voted for choice {} in poll {}", choice.id, poll.id);
    Ok(VoteOutcome::Voted(PollTally::load(&choices, poll).await?))
}

/// Commit the session's transaction, retrying while the result is unknown.
async fn commit(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(err) if is_unknown_commit_result(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                debug!("Vote commit result unknown (attempt {attempt}), retrying: {err}");
                attempt += 1;
            }
            result => return Ok(result?),
        }
    }
}

/// Roll back the session's transaction. The server may already have aborted it.
async fn abort(session: &mut ClientSession) {
    if let Err(err) = session.abort_transaction().await {
        debug!("Abort of vote transaction failed: {err}");
    }
}
