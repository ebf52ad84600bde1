//! Contracts a domain object type fulfils to be loaded and saved.
//!
//! # Responsibility
//! - `Record`: per-instance identity and persistence hook.
//! - `Descriptor`: type-level table metadata and row factory.
//!
//! # Invariants
//! - A record's key is absent until its first successful save, then stable.
//! - Composite keys are flattened into one comma-joined string.

pub mod record;

pub use record::{flatten_key, Accessor, Descriptor, Record};
