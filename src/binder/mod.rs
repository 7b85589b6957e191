/// Bound-statement data model: spans, values, assignment segments, contexts.
pub mod context;
/// MySQL `INSERT ... ON DUPLICATE KEY UPDATE` binder built on `sqlparser`.
pub mod insert;
/// Identifier unquoting and normalization helpers.
pub mod names;
