//! Structured activity logging.

pub mod jsonl;
