use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::binder::context::PlainValue;
use crate::binder::names::normalize_identifier;
use crate::rule::encryptor::{CipherError, Encryptor};

/// Physical projections and cipher capability of one encrypted logical column.
///
/// The cipher column is always present; the assisted-query and plain columns
/// are each independently optional.
#[derive(Clone)]
pub struct ColumnEncryptionPolicy {
    /// Physical column storing the encrypted value.
    pub cipher_column: String,
    /// Physical column storing the deterministic queryable index, if any.
    pub assisted_query_column: Option<String>,
    /// Physical column retaining the original plaintext, if any.
    pub plain_column: Option<String>,
    /// The cipher applied to this column's values.
    pub encryptor: Arc<dyn Encryptor>,
}

impl ColumnEncryptionPolicy {
    /// A policy with only the mandatory cipher projection.
    pub fn new(cipher_column: impl Into<String>, encryptor: Arc<dyn Encryptor>) -> Self {
        ColumnEncryptionPolicy {
            cipher_column: cipher_column.into(),
            assisted_query_column: None,
            plain_column: None,
            encryptor,
        }
    }

    /// Add an assisted-query projection.
    #[must_use]
    pub fn with_assisted_query(mut self, column: impl Into<String>) -> Self {
        self.assisted_query_column = Some(column.into());
        self
    }

    /// Add a plain projection.
    #[must_use]
    pub fn with_plain(mut self, column: impl Into<String>) -> Self {
        self.plain_column = Some(column.into());
        self
    }
}

impl fmt::Debug for ColumnEncryptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnEncryptionPolicy")
            .field("cipher_column", &self.cipher_column)
            .field("assisted_query_column", &self.assisted_query_column)
            .field("plain_column", &self.plain_column)
            .finish_non_exhaustive()
    }
}

/// Errors raised while constructing an [`EncryptRule`].
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A policy was declared with an empty cipher column.
    #[error("column `{table}`.`{column}` has an empty cipher column")]
    EmptyCipherColumn {
        /// Table of the offending policy.
        table: String,
        /// Logical column of the offending policy.
        column: String,
    },
    /// Two policies were declared for the same logical column.
    #[error("duplicate encryption policy for column `{table}`.`{column}`")]
    DuplicatePolicy {
        /// Table of the offending policy.
        table: String,
        /// Logical column of the offending policy.
        column: String,
    },
}

/// Errors raised by the value cipher service.
#[derive(Debug, Error)]
pub enum ValueCipherError {
    /// The addressed column carries no encryption policy.
    #[error("no encryption policy resolves for column `{table}`.`{column}`")]
    UnresolvedPolicy {
        /// Table addressed by the caller.
        table: String,
        /// Column addressed by the caller.
        column: String,
    },
    /// The encryptor failed on one value; the whole batch is rejected.
    #[error("cipher transform failed for column `{column}` at value position {position}")]
    Transform {
        /// Column whose encryptor failed.
        column: String,
        /// Zero-based index of the offending value in the input batch.
        position: usize,
        /// The underlying cipher failure.
        #[source]
        source: CipherError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    schema: Option<String>,
    table: String,
}

/// The encryption rule: an immutable map from logical columns to policies
/// plus the value cipher service operating over it.
///
/// Constructed once (from code via [`EncryptRule::builder`] or from
/// configuration via [`EncryptRule::from_config`]) and shared read-only, so
/// concurrent rewrites need no locking. Identifiers are normalized on both
/// insert and lookup; callers are expected to pass pre-normalized names from
/// the binder, and lookups normalize again to stay insensitive to casing.
#[derive(Debug, Default)]
pub struct EncryptRule {
    tables: HashMap<TableKey, HashMap<String, ColumnEncryptionPolicy>>,
}

impl EncryptRule {
    /// Start building a rule in code.
    pub fn builder() -> EncryptRuleBuilder {
        EncryptRuleBuilder::default()
    }

    /// The policy for `column`, if the column is encrypted.
    ///
    /// A table rule pinned to a schema only matches that schema; an unpinned
    /// rule matches any schema.
    pub fn find_policy(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Option<&ColumnEncryptionPolicy> {
        let table = normalize_identifier(table);
        let column = normalize_identifier(column);
        if let Some(schema) = schema {
            let key = TableKey {
                schema: Some(normalize_identifier(schema)),
                table: table.clone(),
            };
            if let Some(policy) = self.tables.get(&key).and_then(|columns| columns.get(&column)) {
                return Some(policy);
            }
        }
        self.tables
            .get(&TableKey {
                schema: None,
                table,
            })
            .and_then(|columns| columns.get(&column))
    }

    /// Cipher column of an encrypted column.
    pub fn cipher_column_of(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Option<&str> {
        self.find_policy(schema, table, column)
            .map(|policy| policy.cipher_column.as_str())
    }

    /// Assisted-query column of an encrypted column, when the policy has one.
    pub fn find_assisted_query_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Option<&str> {
        self.find_policy(schema, table, column)
            .and_then(|policy| policy.assisted_query_column.as_deref())
    }

    /// Plain column of an encrypted column, when the policy has one.
    pub fn find_plain_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Option<&str> {
        self.find_policy(schema, table, column)
            .and_then(|policy| policy.plain_column.as_deref())
    }

    /// Encrypt a batch of plaintext values into cipher values.
    ///
    /// Length- and order-preserving: the output at index `i` is the transform
    /// of the input at index `i`. A failure on any value rejects the whole
    /// batch. `Null` passes through untransformed.
    pub fn encrypt_cipher_values(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        values: &[PlainValue],
    ) -> Result<Vec<PlainValue>, ValueCipherError> {
        self.transform_values(schema, table, column, values, |encryptor, plain| {
            encryptor.encrypt(plain)
        })
    }

    /// Derive assisted-query index values for a batch of plaintext values.
    ///
    /// Same length, order, and whole-batch-failure contract as
    /// [`EncryptRule::encrypt_cipher_values`].
    pub fn encrypt_assisted_query_values(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        values: &[PlainValue],
    ) -> Result<Vec<PlainValue>, ValueCipherError> {
        self.transform_values(schema, table, column, values, |encryptor, plain| {
            encryptor.assisted_query_index(plain)
        })
    }

    /// Decrypt one stored cipher value, for the result-set half of the
    /// middleware. Returns `Ok(None)` when the column's encryptor is one-way.
    pub fn decrypt_value(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        cipher: &str,
    ) -> Result<Option<String>, ValueCipherError> {
        let policy = self.find_policy(schema, table, column).ok_or_else(|| {
            ValueCipherError::UnresolvedPolicy {
                table: table.to_string(),
                column: column.to_string(),
            }
        })?;
        policy
            .encryptor
            .decrypt(cipher)
            .map_err(|source| ValueCipherError::Transform {
                column: column.to_string(),
                position: 0,
                source,
            })
    }

    fn transform_values(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        values: &[PlainValue],
        transform: impl Fn(&dyn Encryptor, &str) -> Result<String, CipherError>,
    ) -> Result<Vec<PlainValue>, ValueCipherError> {
        let policy = self.find_policy(schema, table, column).ok_or_else(|| {
            ValueCipherError::UnresolvedPolicy {
                table: table.to_string(),
                column: column.to_string(),
            }
        })?;
        values
            .iter()
            .enumerate()
            .map(|(position, value)| match value {
                PlainValue::Null => Ok(PlainValue::Null),
                other => transform(policy.encryptor.as_ref(), other.as_text())
                    .map(PlainValue::Text)
                    .map_err(|source| ValueCipherError::Transform {
                        column: column.to_string(),
                        position,
                        source,
                    }),
            })
            .collect()
    }
}

/// Builder assembling an [`EncryptRule`] from in-code policies.
#[derive(Debug, Default)]
pub struct EncryptRuleBuilder {
    tables: HashMap<TableKey, HashMap<String, ColumnEncryptionPolicy>>,
    errors: Vec<PolicyError>,
}

impl EncryptRuleBuilder {
    /// Declare a policy for `table`.`column`, matching any schema.
    #[must_use]
    pub fn column(self, table: &str, column: &str, policy: ColumnEncryptionPolicy) -> Self {
        self.insert(None, table, column, policy)
    }

    /// Declare a policy for `schema`.`table`.`column`.
    #[must_use]
    pub fn schema_column(
        self,
        schema: &str,
        table: &str,
        column: &str,
        policy: ColumnEncryptionPolicy,
    ) -> Self {
        self.insert(Some(schema), table, column, policy)
    }

    /// Validate and finish the rule.
    pub fn build(self) -> Result<EncryptRule, PolicyError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(EncryptRule {
                tables: self.tables,
            }),
        }
    }

    fn insert(
        mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        policy: ColumnEncryptionPolicy,
    ) -> Self {
        let table_name = normalize_identifier(table);
        let column_name = normalize_identifier(column);
        if policy.cipher_column.trim().is_empty() {
            self.errors.push(PolicyError::EmptyCipherColumn {
                table: table_name,
                column: column_name,
            });
            return self;
        }
        let key = TableKey {
            schema: schema.map(normalize_identifier),
            table: table_name.clone(),
        };
        let previous = self.tables.entry(key).or_default().insert(column_name.clone(), policy);
        if previous.is_some() {
            self.errors.push(PolicyError::DuplicatePolicy {
                table: table_name,
                column: column_name,
            });
        }
        self
    }
}
