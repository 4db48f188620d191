//! Todo domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every todo is identified by a stable `TodoId` and owned by one `OwnerId`.
//! - Archiving hides a todo; only explicit delete destroys it.

pub mod todo;
