//! Generator dispatch.
//!
//! Each rewrite rule (encryption, and in the full middleware: sharding,
//! audit, read-write split) contributes generators implementing
//! [`SqlTokenGenerator`]. The engine tries every registered generator's gate
//! independently and concatenates their token output, so independently
//! developed rules coexist on one statement without cross-contamination.

use std::sync::Arc;

use crate::binder::context::StatementContext;
use crate::rewrite::insert_on_update::InsertOnUpdateTokenGenerator;
use crate::rewrite::token::RewriteToken;
use crate::rewrite::RewriteError;
use crate::rule::policy::EncryptRule;

/// A two-phase rewrite-token generator.
pub trait SqlTokenGenerator: Send + Sync {
    /// Whether this generator applies to the statement at all.
    ///
    /// [`SqlTokenGenerator::generate`] is only invoked when this returns
    /// `true`.
    fn is_applicable(&self, context: &StatementContext) -> bool;

    /// Generate tokens for an applicable statement.
    ///
    /// Returns an empty vector, not an error, when nothing in the statement
    /// resolves to a policy.
    fn generate(&self, context: &StatementContext) -> Result<Vec<RewriteToken>, RewriteError>;
}

/// Runs an explicit, ordered list of registered generators over a statement.
pub struct SqlRewriteEngine {
    generators: Vec<Box<dyn SqlTokenGenerator>>,
}

impl SqlRewriteEngine {
    /// An engine with the encryption generators registered for `rule`.
    pub fn new(rule: Arc<EncryptRule>) -> Self {
        SqlRewriteEngine {
            generators: vec![Box::new(InsertOnUpdateTokenGenerator::new(rule))],
        }
    }

    /// An engine with no generators; combine with [`SqlRewriteEngine::register`].
    pub fn empty() -> Self {
        SqlRewriteEngine {
            generators: Vec::new(),
        }
    }

    /// Append a generator to the dispatch list.
    pub fn register(&mut self, generator: Box<dyn SqlTokenGenerator>) {
        self.generators.push(generator);
    }

    /// Generate the ordered token collection for one statement.
    ///
    /// Tokens are returned sorted by ascending start offset; the collection
    /// is owned by the caller and valid only against the statement text the
    /// context was bound from.
    pub fn generate_tokens(
        &self,
        context: &StatementContext,
    ) -> Result<Vec<RewriteToken>, RewriteError> {
        let mut tokens = Vec::new();
        for generator in &self.generators {
            if generator.is_applicable(context) {
                tokens.extend(generator.generate(context)?);
            }
        }
        tokens.sort_by_key(|token| token.span().start);
        debug_assert!(
            tokens
                .windows(2)
                .all(|pair| pair[0].span().stop <= pair[1].span().start),
            "generators emitted overlapping tokens"
        );
        Ok(tokens)
    }
}
