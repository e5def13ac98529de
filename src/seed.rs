//! Default data for a fresh deployment: an admin account and a first poll.

use log::{info, warn};
use mongodb::{Client, Database};

use crate::error::{Error, Result};
use crate::model::{
    db::{Contestant, NewUser, Poll, PollSpec, User},
    mongodb::Coll,
};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const DEFAULT_POLL_QUESTION: &str = "Yaa noqonaya Madaxwaynaha Puntland";
const DEFAULT_POLL_NAME: &str = "Doorashada Madaxweynaha Dowlada P";
const DEFAULT_CONTESTANTS: [&str; 2] = ["Dr. Maxamed", "Dr. Ayaanle"];

/// The poll created when the database has none.
pub fn default_poll_spec() -> PollSpec {
    PollSpec {
        question: DEFAULT_POLL_QUESTION.to_string(),
        name: DEFAULT_POLL_NAME.to_string(),
        image: None,
        contestants: DEFAULT_CONTESTANTS.map(Contestant::named),
        choices: DEFAULT_CONTESTANTS.map(str::to_string).to_vec(),
    }
}

fn default_admin() -> NewUser {
    NewUser {
        full_name: None,
        email: None,
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password: DEFAULT_ADMIN_PASSWORD.to_string(),
        is_admin: true,
        front_id_image: None,
        back_id_image: None,
    }
}

/// Create the default admin account and default poll, each only if absent.
///
/// This operation is idempotent.
pub async fn seed_defaults(client: &Client, db: &Database) -> Result<()> {
    let users = Coll::<User>::from_db(db);
    match User::create(&users, default_admin()).await {
        Ok(_) => warn!("Created default admin account `{DEFAULT_ADMIN_USERNAME}`; change its password"),
        Err(Error::DuplicateUsername) => info!("Default admin account already exists"),
        Err(err) => return Err(err),
    }

    let polls = Coll::<Poll>::from_db(db);
    if Poll::latest(&polls).await?.is_none() {
        let created = Poll::create(client, db, default_poll_spec()).await?;
        info!("Created default poll {} ({})", created.poll.id, created.poll.name);
    }

    Ok(())
}
