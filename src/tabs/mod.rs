//! Tablature Layer
//!
//! Derives deterministic tab search links for a recognized song and
//! queries a remote tab catalog for candidate tablature.

pub mod links;
pub mod lookup;

pub use links::TabLinks;
pub use lookup::{LookupError, TabLookupClient, TabResult};
