use rocket::Route;

pub mod admin;
pub mod auth;
pub mod poll;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(poll::routes());
    routes.extend(admin::routes());
    routes
}
