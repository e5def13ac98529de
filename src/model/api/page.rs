//! JSON page documents returned by the `GET` endpoints and by a vote.

use rocket::request::FlashMessage;
use serde::{Deserialize, Serialize};

use crate::model::db::{ChoiceId, Contestant, PollId, PollTally};
use crate::workflow::VoteOutcome;

use super::session::SessionUser;

/// A short message carried over from the previous request, e.g. why an
/// action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// `"success"` or `"error"`.
    pub kind: String,
    pub message: String,
}

impl From<FlashMessage<'_>> for Notice {
    fn from(flash: FlashMessage<'_>) -> Self {
        Self {
            kind: flash.kind().to_string(),
            message: flash.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPage {
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupPage {
    pub notice: Option<Notice>,
}

/// The voting page: the latest poll without its tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPage {
    pub notice: Option<Notice>,
    pub username: String,
    pub is_admin: bool,
    /// `None` until an admin creates a poll.
    pub poll: Option<PollDescription>,
}

impl PollPage {
    pub fn new(notice: Option<Notice>, user: &SessionUser, tally: Option<PollTally>) -> Self {
        Self {
            notice,
            username: user.username.clone(),
            is_admin: user.is_admin,
            poll: tally.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsPage {
    pub notice: Option<Notice>,
    pub poll: Option<PollResults>,
    /// This request's vote was counted.
    pub voted: bool,
    /// This request's vote was ignored because the user had already voted.
    pub already_voted: bool,
}

impl ResultsPage {
    /// Plain results, not in response to a vote.
    pub fn new(notice: Option<Notice>, tally: Option<PollTally>) -> Self {
        Self {
            notice,
            poll: tally.map(Into::into),
            voted: false,
            already_voted: false,
        }
    }
}

impl From<VoteOutcome> for ResultsPage {
    fn from(outcome: VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Voted(tally) => Self {
                notice: None,
                poll: Some(tally.into()),
                voted: true,
                already_voted: false,
            },
            VoteOutcome::AlreadyVoted(tally) => Self {
                notice: None,
                poll: Some(tally.into()),
                voted: false,
                already_voted: true,
            },
        }
    }
}

/// The admin page: the form's notice plus the latest poll's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPage {
    pub notice: Option<Notice>,
    pub poll: Option<PollResults>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: ChoiceId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: PollId,
    pub question: String,
    pub name: String,
    pub image: Option<String>,
    pub contestants: Vec<Contestant>,
    pub choices: Vec<ChoiceOption>,
}

impl From<PollTally> for PollDescription {
    fn from(tally: PollTally) -> Self {
        let PollTally { poll, choices } = tally;
        Self {
            id: poll.id,
            question: poll.question,
            name: poll.name,
            image: poll.image,
            contestants: poll.contestants.into(),
            choices: choices
                .into_iter()
                .map(|choice| ChoiceOption {
                    id: choice.id,
                    text: choice.text,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceTally {
    pub id: ChoiceId,
    pub text: String,
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub id: PollId,
    pub question: String,
    pub name: String,
    pub image: Option<String>,
    pub contestants: Vec<Contestant>,
    pub choices: Vec<ChoiceTally>,
    pub total_votes: u32,
}

impl From<PollTally> for PollResults {
    fn from(tally: PollTally) -> Self {
        let total_votes = tally.total_votes();
        let PollTally { poll, choices } = tally;
        Self {
            id: poll.id,
            question: poll.question,
            name: poll.name,
            image: poll.image,
            contestants: poll.contestants.into(),
            choices: choices
                .into_iter()
                .map(|choice| ChoiceTally {
                    id: choice.id,
                    text: choice.text,
                    votes: choice.votes,
                })
                .collect(),
            total_votes,
        }
    }
}
