//! Domain events and the append-only journal they are retained in.

pub mod event;
pub mod journal;

pub use event::Event;
pub use journal::{Journal, JournalEntry, JournalError};
