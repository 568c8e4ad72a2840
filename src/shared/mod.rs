//! Shared application state
//!
//! Thread-safe state container handed to every component; the owner
//! of the UI thread applies all mutations.

pub mod state;

pub use state::{RuntimeState, SharedAppState};
