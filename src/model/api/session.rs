use std::ops::Deref;

use rocket::{
    http::{Cookie, CookieJar, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    serde::json,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::User,
    mongodb::{Coll, Id},
};

/// Name of the private cookie holding the session.
pub const SESSION_COOKIE: &str = "session";

/// What an authenticated session knows about its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "uid")]
    pub user_id: Id,
    #[serde(rename = "usr")]
    pub username: String,
    #[serde(rename = "adm")]
    pub is_admin: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// The state of a client's session.
///
/// A session becomes [`Session::Authenticated`] by logging in, and goes back to
/// [`Session::Anonymous`] by logging out. There is no expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Authenticated(SessionUser),
}

impl Session {
    /// Authenticate the client as the given user.
    pub fn login(cookies: &CookieJar<'_>, user: &User) -> Self {
        let session_user = SessionUser::from(user);
        // Serialising a struct of plain fields cannot fail.
        let value = json::to_string(&session_user).unwrap_or_default();
        let cookie = Cookie::build(SESSION_COOKIE, value)
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish();
        cookies.add_private(cookie);
        Self::Authenticated(session_user)
    }

    /// Clear all session state.
    pub fn logout(cookies: &CookieJar<'_>) -> Self {
        cookies.remove_private(Cookie::named(SESSION_COOKIE));
        Self::Anonymous
    }

    /// Read the session from the cookie, without checking the user still exists.
    /// A missing, tampered or malformed cookie is an anonymous session.
    pub fn from_cookies(cookies: &CookieJar<'_>) -> Self {
        cookies
            .get_private(SESSION_COOKIE)
            .and_then(|cookie| json::from_str::<SessionUser>(cookie.value()).ok())
            .map_or(Self::Anonymous, Self::Authenticated)
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().map_or(false, |user| user.is_admin)
    }

    /// The session's user, or [`Error::Unauthenticated`].
    pub fn require_authenticated(self) -> Result<SessionUser> {
        match self {
            Self::Anonymous => Err(Error::Unauthenticated),
            Self::Authenticated(user) => Ok(user),
        }
    }

    /// The session's user if they are an admin, or [`Error::Unauthorized`].
    pub fn require_admin(self) -> Result<SessionUser> {
        match self {
            Self::Authenticated(user) if user.is_admin => Ok(user),
            _ => Err(Error::Unauthorized),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = Error;

    /// Read the session cookie. A session whose user no longer exists is
    /// cleared and treated as anonymous.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = Self::from_cookies(req.cookies());
        let Some(user) = session.user() else {
            return Outcome::Success(session);
        };

        // Unwrap is safe as the `Database` is always managed.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        match Coll::<User>::from_db(db).find_one(user.user_id.as_doc(), None).await {
            Ok(Some(_)) => Outcome::Success(session),
            Ok(None) => Outcome::Success(Self::logout(req.cookies())),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

/// Request guard for endpoints that require a logged-in user.
///
/// Forwards when the session is anonymous, so that a lower-ranked route can
/// send the client to the login page.
#[derive(Debug)]
pub struct UserSession(pub SessionUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserSession {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = try_outcome!(req.guard::<Session>().await);
        match session.require_authenticated() {
            Ok(user) => Outcome::Success(Self(user)),
            Err(_) => Outcome::Forward(()),
        }
    }
}

impl Deref for UserSession {
    type Target = SessionUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Request guard for endpoints that require an admin.
///
/// Forwards when the session is anonymous or not an admin.
#[derive(Debug)]
pub struct AdminSession(pub SessionUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = try_outcome!(req.guard::<Session>().await);
        match session.require_admin() {
            Ok(user) => Outcome::Success(Self(user)),
            Err(_) => Outcome::Forward(()),
        }
    }
}

impl Deref for AdminSession {
    type Target = SessionUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::local::asynchronous::Client;

    use super::*;

    fn session_user(is_admin: bool) -> SessionUser {
        SessionUser {
            user_id: Id::new(),
            username: "alice".to_string(),
            is_admin,
        }
    }

    #[test]
    fn anonymous_session_is_rejected_by_both_gates() {
        assert!(!Session::Anonymous.is_authenticated());
        assert!(!Session::Anonymous.is_admin());
        assert!(matches!(
            Session::Anonymous.require_authenticated(),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            Session::Anonymous.require_admin(),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn plain_user_passes_only_authentication_gate() {
        let user = session_user(false);
        let session = Session::Authenticated(user.clone());
        assert!(session.is_authenticated());
        assert!(!session.is_admin());
        assert_eq!(session.clone().require_authenticated().unwrap(), user);
        assert!(matches!(session.require_admin(), Err(Error::Unauthorized)));
    }

    #[test]
    fn admin_passes_both_gates() {
        let admin = session_user(true);
        let session = Session::Authenticated(admin.clone());
        assert!(session.is_admin());
        assert_eq!(session.require_admin().unwrap(), admin);
    }

    #[backend_test(user)]
    async fn deleted_user_session_is_anonymous(client: Client, users: Coll<User>) {
        assert!(client.cookies().get_private(SESSION_COOKIE).is_some());
        let deleted = users
            .delete_one(doc! { "username": "alice" }, None)
            .await
            .unwrap();
        assert_eq!(deleted.deleted_count, 1);

        let response = client.get("/index").dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));
        assert!(client.cookies().get_private(SESSION_COOKIE).is_none());
    }

    #[test]
    fn session_user_survives_cookie_encoding() {
        let user = session_user(true);
        let value = json::to_string(&user).unwrap();
        assert!(value.contains("\"usr\":\"alice\""));
        let decoded: SessionUser = json::from_str(&value).unwrap();
        assert_eq!(decoded, user);
    }
}
