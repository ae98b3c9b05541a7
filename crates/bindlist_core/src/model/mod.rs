//! Record domain model and record store.
//!
//! # Responsibility
//! - Define the flat record shape and its field schema.
//! - Own records, validation and persistence in the record store (`Model`).
//!
//! # Invariants
//! - Records are identified by a synthetic, never-reused `RecordId`.
//! - Store mutations are published on change buses after they are applied.

pub mod record;
pub mod schema;
pub mod store;
