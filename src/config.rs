use std::path::{Path, PathBuf};

use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll};
use crate::seed::seed_defaults;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    poll_image_dir: PathBuf,
    id_upload_dir: PathBuf,
}

impl Config {
    /// Where poll banner and contestant images are stored.
    pub fn poll_image_dir(&self) -> &Path {
        &self.poll_image_dir
    }

    /// Where identity-document images uploaded at signup are stored.
    pub fn id_upload_dir(&self) -> &Path {
        &self.id_upload_dir
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!(
            "Uploads go to {} and {}",
            config.poll_image_dir.display(),
            config.id_upload_dir.display()
        );

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    // non-secrets
    /// Drop the whole database before setting it up. Destroys all data.
    #[serde(default)]
    reset_database: bool,
    /// Create the default admin account and default poll if absent.
    #[serde(default)]
    seed_defaults: bool,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(&config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        if config.reset_database {
            warn!("`reset_database` is set: dropping database {DATABASE_NAME}");
            if let Err(e) = db.drop(None).await {
                error!("Failed to reset database: {e}");
                return Err(rocket);
            }
        }

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create indexes: {e}");
            return Err(rocket);
        }
        if let Err(e) = ensure_counters_exist(&Coll::from_db(&db)).await {
            error!("Failed to create ID counters: {e}");
            return Err(rocket);
        }

        if config.seed_defaults {
            if let Err(e) = seed_defaults(&client, &db).await {
                error!("Failed to seed default data: {e}");
                return Err(rocket);
            }
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Name of the production database.
const DATABASE_NAME: &str = "polls";
