//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep agent/CLI layers decoupled from storage details.

pub mod autonomous;
pub mod bulk;
pub mod stats;
pub mod todo_service;
