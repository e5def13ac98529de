//! DB-compatible (e.g. de/serialisable) types and the operations of each store.
//!
//! Poll and choice IDs are small integers handed out by counters, so that the
//! newest poll is simply the one with the highest ID. User and vote IDs are
//! MongoDB object IDs.

mod choice;
pub use choice::{Choice, ChoiceId};

mod poll;
pub use poll::{Contestant, Poll, PollId, PollSpec, PollTally};

mod user;
pub use user::{NewUser, User, UserCore};

mod vote;
pub use vote::VoteRecord;
