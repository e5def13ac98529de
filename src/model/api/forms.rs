use rocket::fs::TempFile;

use crate::model::db::ChoiceId;

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Account creation. Both identity-document images are required, but that is
/// checked by the handler so the user gets a notice rather than a form error.
#[derive(Debug, FromForm)]
pub struct SignupForm<'r> {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub front_id: Option<TempFile<'r>>,
    pub back_id: Option<TempFile<'r>>,
}

#[derive(Debug, FromForm)]
pub struct VoteForm {
    /// A missing or unparsable choice is treated as an invalid choice.
    pub choice: Option<ChoiceId>,
}

/// A new poll, as submitted from the admin page.
#[derive(Debug, FromForm)]
pub struct PollForm<'r> {
    pub question: String,
    pub poll_name: String,
    pub poll_image: Option<TempFile<'r>>,
    pub contestant1_name: String,
    pub contestant1_image: Option<TempFile<'r>>,
    pub contestant2_name: String,
    pub contestant2_image: Option<TempFile<'r>>,
    /// One entry per `choices` field.
    pub choices: Vec<String>,
}
