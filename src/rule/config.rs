//! Rule configuration, loaded once at rule construction time.
//!
//! The JSON shape mirrors the middleware's rule definition: a map of named
//! encryptors plus per-table column mappings. Hot-reload, where supported,
//! replaces the whole [`EncryptRule`] instance; nothing here mutates in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::rule::encryptor::{AesGcmSivEncryptor, CipherError, Encryptor};
use crate::rule::policy::{ColumnEncryptionPolicy, EncryptRule, PolicyError};

/// Top-level encrypt rule configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRuleConfig {
    /// Named encryptor definitions referenced by column rules.
    #[serde(default)]
    pub encryptors: BTreeMap<String, EncryptorConfig>,
    /// Per-table column encryption rules, keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableRuleConfig>,
}

/// One named encryptor definition.
#[derive(Debug, Deserialize)]
pub struct EncryptorConfig {
    /// Encryptor type, e.g. `aes-gcm-siv`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific properties, e.g. the base64url `key`.
    #[serde(default)]
    pub props: BTreeMap<String, String>,
}

/// Column rules for one table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRuleConfig {
    /// Pin this table rule to a schema; unpinned rules match any schema.
    #[serde(default)]
    pub schema: Option<String>,
    /// Per-column rules, keyed by logical column name.
    pub columns: BTreeMap<String, ColumnRuleConfig>,
}

/// The physical mapping of one encrypted logical column.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRuleConfig {
    /// Physical cipher column. Required and non-empty.
    pub cipher_column: String,
    /// Optional assisted-query index column.
    #[serde(default)]
    pub assisted_query_column: Option<String>,
    /// Optional plaintext retention column.
    #[serde(default)]
    pub plain_column: Option<String>,
    /// Name of the encryptor in [`EncryptRuleConfig::encryptors`].
    pub encryptor_name: String,
}

/// Errors raised while loading a rule configuration.
///
/// Every variant is a configuration defect: fatal for the rule instance, not
/// recoverable per statement.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document is not valid JSON for this schema.
    #[error("invalid rule configuration JSON")]
    Json(#[from] serde_json::Error),
    /// An encryptor declares a type this build does not provide.
    #[error("unknown encryptor type `{kind}` for encryptor `{name}`")]
    UnknownEncryptorType {
        /// Declared encryptor name.
        name: String,
        /// The unrecognized type string.
        kind: String,
    },
    /// An encryptor definition lacks a required property.
    #[error("encryptor `{name}` is missing required prop `{prop}`")]
    MissingEncryptorProp {
        /// Declared encryptor name.
        name: String,
        /// The missing property key.
        prop: String,
    },
    /// An encryptor property failed validation.
    #[error("invalid prop `{prop}` for encryptor `{name}`")]
    InvalidEncryptorProp {
        /// Declared encryptor name.
        name: String,
        /// The offending property key.
        prop: String,
        /// Why the property was rejected.
        #[source]
        source: CipherError,
    },
    /// A column rule references an encryptor that is not defined.
    #[error("column `{table}`.`{column}` references undefined encryptor `{name}`")]
    UndefinedEncryptor {
        /// Table of the offending column rule.
        table: String,
        /// Logical column of the offending rule.
        column: String,
        /// The dangling encryptor name.
        name: String,
    },
    /// The assembled policies failed structural validation.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl EncryptRuleConfig {
    /// Parse a configuration document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl EncryptRule {
    /// Build an immutable rule from a parsed configuration.
    pub fn from_config(config: &EncryptRuleConfig) -> Result<Self, ConfigError> {
        let mut encryptors: BTreeMap<&str, Arc<dyn Encryptor>> = BTreeMap::new();
        for (name, definition) in &config.encryptors {
            encryptors.insert(name.as_str(), build_encryptor(name, definition)?);
        }
        let mut builder = EncryptRule::builder();
        for (table, table_rule) in &config.tables {
            for (column, column_rule) in &table_rule.columns {
                let encryptor = encryptors
                    .get(column_rule.encryptor_name.as_str())
                    .cloned()
                    .ok_or_else(|| ConfigError::UndefinedEncryptor {
                        table: table.clone(),
                        column: column.clone(),
                        name: column_rule.encryptor_name.clone(),
                    })?;
                let mut policy =
                    ColumnEncryptionPolicy::new(column_rule.cipher_column.clone(), encryptor);
                if let Some(assisted) = &column_rule.assisted_query_column {
                    policy = policy.with_assisted_query(assisted.clone());
                }
                if let Some(plain) = &column_rule.plain_column {
                    policy = policy.with_plain(plain.clone());
                }
                builder = match &table_rule.schema {
                    Some(schema) => builder.schema_column(schema, table, column, policy),
                    None => builder.column(table, column, policy),
                };
            }
        }
        Ok(builder.build()?)
    }
}

fn build_encryptor(
    name: &str,
    definition: &EncryptorConfig,
) -> Result<Arc<dyn Encryptor>, ConfigError> {
    match definition.kind.as_str() {
        "aes-gcm-siv" => {
            let key = definition.props.get("key").ok_or_else(|| {
                ConfigError::MissingEncryptorProp {
                    name: name.to_string(),
                    prop: "key".to_string(),
                }
            })?;
            let encryptor = AesGcmSivEncryptor::from_base64_key(key).map_err(|source| {
                ConfigError::InvalidEncryptorProp {
                    name: name.to_string(),
                    prop: "key".to_string(),
                    source,
                }
            })?;
            Ok(Arc::new(encryptor))
        }
        other => Err(ConfigError::UnknownEncryptorType {
            name: name.to_string(),
            kind: other.to_string(),
        }),
    }
}
