//! Outbound synchronization with external task-list providers.

pub mod jsonl_sink;
pub mod outbox;
