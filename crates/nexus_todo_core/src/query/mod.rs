//! Read-side selection over an owner's todos.
//!
//! # Responsibility
//! - Evaluate filter predicates and produce the canonical listing order.
//! - Stay storage-agnostic: input is the repository's insertion-ordered list.

pub mod filter;
