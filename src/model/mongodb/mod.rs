mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_counters_exist, Counter, CHOICE_ID_COUNTER, POLL_ID_COUNTER};
pub use errors::{
    is_duplicate_key_error, is_transient_transaction_error, is_unknown_commit_result,
    MAX_TRANSACTION_ATTEMPTS, TRANSACTION_RETRY_BACKOFF,
};
