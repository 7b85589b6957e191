//! Token generation for `INSERT ... ON DUPLICATE KEY UPDATE`.
//!
//! For every assignment in the clause, in source order: resolve whether the
//! target column is encrypted, then emit the token matching the value shape.
//! Consistency across a `VALUES(col)` self-reference is validated inline:
//! each of the three projections (cipher, assisted-query, plain) must be
//! present on both sides or on neither, otherwise the statement is rejected —
//! encrypting one side only would corrupt the upsert semantics.

use std::sync::Arc;

use crate::binder::context::{AssignmentSegment, PlainValue, Span, StatementContext, ValueExpr};
use crate::rewrite::generator::SqlTokenGenerator;
use crate::rewrite::token::{
    FunctionAssignmentToken, LiteralAssignmentToken, ParameterAssignmentToken, RewriteToken,
};
use crate::rewrite::RewriteError;
use crate::rule::policy::{ColumnEncryptionPolicy, EncryptRule};

/// Assignment token generator for the `ON DUPLICATE KEY UPDATE` clause.
pub struct InsertOnUpdateTokenGenerator {
    rule: Arc<EncryptRule>,
}

impl InsertOnUpdateTokenGenerator {
    /// A generator reading policies from `rule`.
    pub fn new(rule: Arc<EncryptRule>) -> Self {
        InsertOnUpdateTokenGenerator { rule }
    }

    fn function_token(
        &self,
        schema: Option<&str>,
        table: &str,
        segment: &AssignmentSegment,
        right_column: &str,
    ) -> Result<RewriteToken, RewriteError> {
        let left_column = segment.column.name.as_str();
        let unsupported = || RewriteError::UnsupportedClause {
            clause: format!("{left_column} = VALUES({right_column})"),
        };
        let mut token = FunctionAssignmentToken::new(token_span(segment));
        match (
            self.rule.find_policy(schema, table, left_column),
            self.rule.find_policy(schema, table, right_column),
        ) {
            (Some(left), Some(right)) => token.add_assignment(
                left.cipher_column.clone(),
                format!("VALUES({})", right.cipher_column),
            ),
            (None, None) => {}
            _ => return Err(unsupported()),
        }
        match (
            self.rule.find_assisted_query_column(schema, table, left_column),
            self.rule.find_assisted_query_column(schema, table, right_column),
        ) {
            (Some(left), Some(right)) => token.add_assignment(left, format!("VALUES({right})")),
            (None, None) => {}
            _ => return Err(unsupported()),
        }
        match (
            self.rule.find_plain_column(schema, table, left_column),
            self.rule.find_plain_column(schema, table, right_column),
        ) {
            (Some(left), Some(right)) => token.add_assignment(left, format!("VALUES({right})")),
            (None, None) => {}
            _ => return Err(unsupported()),
        }
        // Resolution believed a policy existed but produced nothing renderable.
        if token.is_empty() {
            return Err(unsupported());
        }
        Ok(RewriteToken::Function(token))
    }

    fn literal_token(
        &self,
        schema: Option<&str>,
        table: &str,
        segment: &AssignmentSegment,
        policy: &ColumnEncryptionPolicy,
        value: &PlainValue,
    ) -> Result<RewriteToken, RewriteError> {
        let column = segment.column.name.as_str();
        let mut token = LiteralAssignmentToken::new(token_span(segment));
        let mut cipher_values =
            self.rule
                .encrypt_cipher_values(schema, table, column, std::slice::from_ref(value))?;
        token.add_assignment(policy.cipher_column.clone(), cipher_values.remove(0));
        if let Some(assisted) = &policy.assisted_query_column {
            let mut assisted_values = self.rule.encrypt_assisted_query_values(
                schema,
                table,
                column,
                std::slice::from_ref(value),
            )?;
            token.add_assignment(assisted.clone(), assisted_values.remove(0));
        }
        if let Some(plain) = &policy.plain_column {
            token.add_assignment(plain.clone(), value.clone());
        }
        Ok(RewriteToken::Literal(token))
    }
}

fn parameter_token(segment: &AssignmentSegment, policy: &ColumnEncryptionPolicy) -> RewriteToken {
    let mut token = ParameterAssignmentToken::new(token_span(segment));
    token.add_column_name(policy.cipher_column.clone());
    if let Some(assisted) = &policy.assisted_query_column {
        token.add_column_name(assisted.clone());
    }
    if let Some(plain) = &policy.plain_column {
        token.add_column_name(plain.clone());
    }
    RewriteToken::Parameter(token)
}

/// Tokens replace from the target column's start to the assignment's stop.
fn token_span(segment: &AssignmentSegment) -> Span {
    Span::new(segment.column.span.start, segment.span.stop)
}

impl SqlTokenGenerator for InsertOnUpdateTokenGenerator {
    fn is_applicable(&self, context: &StatementContext) -> bool {
        let StatementContext::Insert(insert) = context;
        !insert.on_duplicate_key.is_empty()
    }

    fn generate(&self, context: &StatementContext) -> Result<Vec<RewriteToken>, RewriteError> {
        let StatementContext::Insert(insert) = context;
        let schema = insert.schema.as_deref();
        let table = insert.table.as_str();
        let mut tokens = Vec::new();
        for segment in &insert.on_duplicate_key {
            let left_policy = self.rule.find_policy(schema, table, &segment.column.name);
            if let Some(right_column) = segment.value.as_values_self_reference() {
                if left_policy.is_none()
                    && self.rule.find_policy(schema, table, right_column).is_none()
                {
                    // Neither side is encrypted: the common pass-through case.
                    continue;
                }
                tokens.push(self.function_token(schema, table, segment, right_column)?);
                continue;
            }
            let Some(policy) = left_policy else {
                continue;
            };
            match &segment.value {
                ValueExpr::Parameter { .. } => tokens.push(parameter_token(segment, policy)),
                ValueExpr::Literal { value, .. } => {
                    tokens.push(self.literal_token(schema, table, segment, policy, value)?);
                }
                ValueExpr::Function { name, .. } => {
                    // An encrypted column assigned a function we cannot
                    // rewrite would execute against the physical cipher
                    // column with a plaintext result. Reject instead.
                    return Err(RewriteError::UnsupportedClause {
                        clause: format!("{} = {name}(...)", segment.column.name),
                    });
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::context::{
        ColumnRef, InsertStatementContext, PlainValue, StatementContext, ValueExpr,
    };
    use crate::rule::encryptor::{CipherError, Encryptor};
    use crate::rule::policy::ColumnEncryptionPolicy;

    struct TagEncryptor;

    impl Encryptor for TagEncryptor {
        fn encrypt(&self, plain: &str) -> Result<String, CipherError> {
            Ok(format!("enc({plain})"))
        }

        fn assisted_query_index(&self, plain: &str) -> Result<String, CipherError> {
            Ok(format!("aq({plain})"))
        }
    }

    fn rule() -> Arc<EncryptRule> {
        Arc::new(
            EncryptRule::builder()
                .column(
                    "t",
                    "name",
                    ColumnEncryptionPolicy::new("name_cipher", Arc::new(TagEncryptor))
                        .with_assisted_query("name_assisted"),
                )
                .build()
                .expect("rule should build"),
        )
    }

    fn segment(column: &str, value: ValueExpr, start: usize, stop: usize) -> AssignmentSegment {
        AssignmentSegment {
            column: ColumnRef {
                name: column.to_string(),
                span: Span::new(start, start + column.len()),
            },
            value,
            span: Span::new(start, stop),
        }
    }

    fn context(segments: Vec<AssignmentSegment>) -> StatementContext {
        StatementContext::Insert(InsertStatementContext {
            schema: None,
            table: "t".to_string(),
            on_duplicate_key: segments,
        })
    }

    #[test]
    fn gate_requires_a_non_empty_clause() {
        let generator = InsertOnUpdateTokenGenerator::new(rule());
        assert!(!generator.is_applicable(&context(Vec::new())));
        let parameter = ValueExpr::Parameter {
            span: Span::new(7, 8),
        };
        assert!(generator.is_applicable(&context(vec![segment("name", parameter, 0, 8)])));
    }

    #[test]
    fn parameter_token_lists_projections_in_fixed_order() {
        let generator = InsertOnUpdateTokenGenerator::new(rule());
        let parameter = ValueExpr::Parameter {
            span: Span::new(7, 8),
        };
        let tokens = generator
            .generate(&context(vec![segment("name", parameter, 0, 8)]))
            .unwrap();
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            RewriteToken::Parameter(token) => {
                assert_eq!(token.column_names(), ["name_cipher", "name_assisted"]);
                assert_eq!(tokens[0].span(), Span::new(0, 8));
            }
            other => panic!("expected parameter token, got {other:?}"),
        }
    }

    #[test]
    fn unencrypted_literal_assignment_passes_through() {
        let generator = InsertOnUpdateTokenGenerator::new(rule());
        let literal = ValueExpr::Literal {
            value: PlainValue::Number("1".into()),
            span: Span::new(5, 6),
        };
        let tokens = generator
            .generate(&context(vec![segment("id", literal, 0, 6)]))
            .unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn non_rewritable_function_on_encrypted_column_is_rejected() {
        let generator = InsertOnUpdateTokenGenerator::new(rule());
        let call = ValueExpr::Function {
            name: "UPPER".into(),
            args: vec!["name".into()],
            span: Span::new(7, 18),
        };
        let err = generator
            .generate(&context(vec![segment("name", call, 0, 18)]))
            .expect_err("UPPER(name) cannot be rewritten");
        assert!(matches!(err, RewriteError::UnsupportedClause { .. }));
    }
}
