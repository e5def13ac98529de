//! Data types, split by where they live.
//!
//! - [`db`] types are stored in MongoDB and implement the stores.
//! - [`api`] types are exchanged with clients: forms, pages, and the session cookie.
//! - [`mongodb`] holds the database plumbing shared by both.

pub mod api;
pub mod db;
pub mod mongodb;
