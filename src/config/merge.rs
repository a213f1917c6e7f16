//! Merge rules for option sources.

pub mod merge_policy;
