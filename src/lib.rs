#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod seed;
pub mod workflow;

pub use config::Config;

/// Assemble the server: request logging, application config, the database
/// connection, and all routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .mount("/", api::routes())
}

/// Connect to the database named by `db_uri` in the Rocket config.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database with `db_uri` {db_uri}: {e}"))
}

/// A fresh database name for a single test.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Build a rocket that uses the given database directly, bypassing
/// [`config::DatabaseFairing`]. Uploads go to a per-database temporary directory.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use model::mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll};

    let db = client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    ensure_counters_exist(&Coll::from_db(&db)).await.unwrap();

    let uploads = std::env::temp_dir().join(db_name);
    let figment = rocket::Config::figment()
        .merge(("poll_image_dir", uploads.join("poll_images")))
        .merge(("id_upload_dir", uploads.join("id_uploads")));

    rocket::custom(figment)
        .attach(config::ConfigFairing)
        .manage(client)
        .manage(db)
        .mount("/", api::routes())
}
