//! Types exchanged with clients.

mod forms;
pub use forms::{LoginForm, PollForm, SignupForm, VoteForm};

mod page;
pub use page::{
    AdminPage, ChoiceOption, ChoiceTally, LoginPage, Notice, PollDescription, PollPage,
    PollResults, ResultsPage, SignupPage,
};

mod session;
pub use session::{AdminSession, Session, SessionUser, UserSession, SESSION_COOKIE};

pub mod upload;
