//! Content ledger: every item ever ingested, keyed by fingerprint.

pub mod repository;
pub mod types;

pub use repository::ContentRepository;
pub use types::{fingerprint, Content, NewContent};
