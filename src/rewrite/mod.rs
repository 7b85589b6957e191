/// Generator dispatch: the applicability gate and the rewrite engine.
pub mod generator;
/// The `INSERT ... ON DUPLICATE KEY UPDATE` assignment token generator.
pub mod insert_on_update;
/// The rewrite token model.
pub mod token;

use thiserror::Error;

use crate::rule::policy::ValueCipherError;

/// Errors raised while generating rewrite tokens for one statement.
///
/// None of these is retried at this layer: the caller must reject the
/// statement before execution, since running it unrewritten would leak
/// plaintext or corrupt stored data.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A SQL construct mixes encrypted and unencrypted columns in a way that
    /// cannot be rewritten consistently.
    #[error("the SQL clause `{clause}` is unsupported by the encrypt rule")]
    UnsupportedClause {
        /// Rendered text of the offending clause.
        clause: String,
    },
    /// The value cipher service failed; see [`ValueCipherError`].
    #[error(transparent)]
    CipherTransform(#[from] ValueCipherError),
}
