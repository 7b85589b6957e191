//! Transparent column-level encryption rewriting for SQL statements.
//!
//! Client applications issue SQL against logical columns; this crate decides
//! which of those columns carry an encryption policy and produces
//! positionally-anchored replacement tokens substituting the physical
//! cipher/assisted-query/plain columns and encrypted values, so the
//! application never observes that encryption exists.
#![warn(missing_docs)]

/// Bound-statement data model and the MySQL `INSERT` binder.
pub mod binder;
/// Rewrite tokens, generator dispatch, and the assignment token generators.
pub mod rewrite;
/// Encrypt rule: policy store, value cipher service, encryptors, configuration.
pub mod rule;
