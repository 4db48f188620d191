//! Injectable decision policies.

pub mod escalation;
