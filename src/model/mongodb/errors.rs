//! The mongodb crate doesn't provide error code constants, so the one we
//! need is defined here, along with helpers for classifying errors.

use std::time::Duration;

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

pub const DUPLICATE_KEY: i32 = 11000;

/// How many times a transaction is attempted when it keeps conflicting.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 8;

/// Base delay between transaction attempts; attempt `n` waits `n` times this.
pub const TRANSACTION_RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Return true if the given error is a unique index violation.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the whole transaction can be retried, e.g. after a write conflict.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Return true if a commit may or may not have applied, and can be retried.
pub fn is_unknown_commit_result(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}
