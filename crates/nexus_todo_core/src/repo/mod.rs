//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the owner-scoped todo storage contract.
//! - Provide the canonical in-memory store and a SQLite-backed alternative.
//!
//! # Invariants
//! - Repository writes enforce `Todo::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   storage transport errors.

pub mod memory_repo;
pub mod sqlite_repo;
pub mod todo_repo;
