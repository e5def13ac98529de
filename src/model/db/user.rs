use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, error::Error as DbError};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{is_duplicate_key_error, Coll, Id};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Unique across all users.
    pub username: String,
    /// Stored and compared in plaintext.
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    /// Stored file name of the front of the user's identity document.
    pub front_id_image: Option<String>,
    /// Stored file name of the back of the user's identity document.
    pub back_id_image: Option<String>,
}

/// A user that has not been stored yet.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl User {
    pub async fn find_by_username(users: &Coll<User>, username: &str) -> Result<Option<User>> {
        let filter = doc! {
            "username": username,
        };
        Ok(users.find_one(filter, None).await?)
    }

    /// Find the user with exactly this username and password.
    ///
    /// An unknown username and a wrong password are indistinguishable to the caller.
    pub async fn find_by_credentials(
        users: &Coll<User>,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        let filter = doc! {
            "username": username,
            "password": password,
        };
        Ok(users.find_one(filter, None).await?)
    }

    /// Store a new user, failing with [`Error::DuplicateUsername`] if the
    /// username is taken. The existing user is left untouched in that case.
    pub async fn create(users: &Coll<User>, new_user: NewUser) -> Result<User> {
        let user = User {
            id: Id::new(),
            user: new_user,
        };
        users
            .insert_one(&user, None)
            .await
            .map_err(|err: DbError| {
                if is_duplicate_key_error(&err) {
                    Error::DuplicateUsername
                } else {
                    err.into()
                }
            })?;
        Ok(user)
    }
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}
