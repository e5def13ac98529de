use mongodb::{Client, Database};
use rocket::{form::Form, request::FlashMessage, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{Notice, PollPage, ResultsPage, UserSession, VoteForm},
        db::{Choice, Poll, PollTally},
        mongodb::Coll,
    },
    workflow::submit_vote,
};

pub fn routes() -> Vec<Route> {
    routes![
        index,
        index_anonymous,
        vote,
        vote_anonymous,
        results,
        results_anonymous,
    ]
}

/// The latest poll and its choices.
#[get("/index", rank = 1)]
pub async fn index(
    user: UserSession,
    flash: Option<FlashMessage<'_>>,
    polls: Coll<Poll>,
    choices: Coll<Choice>,
) -> Result<Json<PollPage>> {
    let tally = PollTally::latest(&polls, &choices).await?;
    Ok(Json(PollPage::new(flash.map(Notice::from), &user, tally)))
}

#[get("/index", rank = 2)]
pub fn index_anonymous() -> Error {
    Error::Unauthenticated
}

/// Vote in the latest poll, returning its results.
#[post("/vote", data = "<form>", rank = 1)]
pub async fn vote(
    user: UserSession,
    form: Form<VoteForm>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ResultsPage>> {
    let outcome = submit_vote(db_client, db, user.user_id, form.choice).await?;
    Ok(Json(outcome.into()))
}

#[post("/vote", rank = 2)]
pub fn vote_anonymous() -> Error {
    Error::Unauthenticated
}

#[get("/results", rank = 1)]
pub async fn results(
    _user: UserSession,
    flash: Option<FlashMessage<'_>>,
    polls: Coll<Poll>,
    choices: Coll<Choice>,
) -> Result<Json<ResultsPage>> {
    let tally = PollTally::latest(&polls, &choices).await?;
    Ok(Json(ResultsPage::new(flash.map(Notice::from), tally)))
}

#[get("/results", rank = 2)]
pub fn results_anonymous() -> Error {
    Error::Unauthenticated
}
