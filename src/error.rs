use log::error;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Flash, Redirect, Responder},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
///
/// All variants except [`Error::Db`] and [`Error::Io`] are expected in normal
/// operation: they become a short notice shown on the page the user is sent
/// back to.
#[derive(Debug, Error)]
pub enum Error {
    #[error("That username is already taken")]
    DuplicateUsername,
    #[error("Please upload both the front and back of your ID")]
    MissingUploads,
    #[error("A poll cannot have that many choices")]
    TooManyChoices,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("There is no poll to vote on yet")]
    NoActivePoll,
    #[error("Please pick a valid choice")]
    InvalidChoice,
    #[error("You have already voted in this poll")]
    DuplicateVote,
    #[error("Please log in")]
    Unauthenticated,
    #[error("Only admins can access that page")]
    Unauthorized,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The page the user is sent back to when this error ends a request,
    /// or `None` if it is a server fault.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateUsername | Self::MissingUploads => Some("/signup"),
            Self::InvalidCredentials | Self::Unauthenticated => Some("/"),
            Self::NoActivePoll | Self::InvalidChoice | Self::Unauthorized => Some("/index"),
            Self::DuplicateVote => Some("/results"),
            Self::TooManyChoices => Some("/admin"),
            Self::Db(_) | Self::Io(_) => None,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        match self.redirect_target() {
            Some(target) => Flash::error(Redirect::to(target), self.to_string()).respond_to(req),
            None => {
                error!("{self}");
                Err(Status::InternalServerError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_send_user_back_to_origin() {
        assert_eq!(Error::DuplicateUsername.redirect_target(), Some("/signup"));
        assert_eq!(Error::MissingUploads.redirect_target(), Some("/signup"));
        assert_eq!(Error::InvalidCredentials.redirect_target(), Some("/"));
        assert_eq!(Error::Unauthenticated.redirect_target(), Some("/"));
        assert_eq!(Error::NoActivePoll.redirect_target(), Some("/index"));
        assert_eq!(Error::InvalidChoice.redirect_target(), Some("/index"));
        assert_eq!(Error::Unauthorized.redirect_target(), Some("/index"));
        assert_eq!(Error::DuplicateVote.redirect_target(), Some("/results"));
        assert_eq!(Error::TooManyChoices.redirect_target(), Some("/admin"));
    }

    #[test]
    fn storage_faults_are_not_notices() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.redirect_target(), None);
    }
}
