#![allow(dead_code)]

use std::sync::Arc;

use sqlcloak::binder::context::StatementContext;
use sqlcloak::binder::insert;
use sqlcloak::rewrite::token::RewriteToken;
use sqlcloak::rule::encryptor::{CipherError, Encryptor};
use sqlcloak::rule::policy::{ColumnEncryptionPolicy, EncryptRule};

/// A readable, reversible test cipher: `enc(plain)` / `aq(plain)`.
pub(crate) struct TagEncryptor;

impl Encryptor for TagEncryptor {
    fn encrypt(&self, plain: &str) -> Result<String, CipherError> {
        Ok(format!("enc({plain})"))
    }

    fn decrypt(&self, cipher: &str) -> Result<Option<String>, CipherError> {
        cipher
            .strip_prefix("enc(")
            .and_then(|rest| rest.strip_suffix(')'))
            .map(|plain| Some(plain.to_string()))
            .ok_or(CipherError::InvalidFormat)
    }

    fn assisted_query_index(&self, plain: &str) -> Result<String, CipherError> {
        Ok(format!("aq({plain})"))
    }
}

/// Rule fixture: `t.name` has cipher + assisted-query projections, `t.pwd`
/// has cipher + plain, `t.card` has cipher only. `id` and everything else is
/// unencrypted.
pub(crate) fn tag_rule() -> Arc<EncryptRule> {
    Arc::new(
        EncryptRule::builder()
            .column(
                "t",
                "name",
                ColumnEncryptionPolicy::new("name_cipher", Arc::new(TagEncryptor))
                    .with_assisted_query("name_assisted"),
            )
            .column(
                "t",
                "pwd",
                ColumnEncryptionPolicy::new("pwd_cipher", Arc::new(TagEncryptor))
                    .with_plain("pwd_plain"),
            )
            .column(
                "t",
                "card",
                ColumnEncryptionPolicy::new("card_cipher", Arc::new(TagEncryptor)),
            )
            .build()
            .expect("fixture rule should build"),
    )
}

pub(crate) fn bind(sql: &str) -> StatementContext {
    insert::bind(sql, None).expect("statement should bind")
}

/// Apply tokens in ascending span order, copying untouched regions verbatim.
pub(crate) fn splice(sql: &str, tokens: &[RewriteToken]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for token in tokens {
        let span = token.span();
        out.push_str(&sql[cursor..span.start]);
        out.push_str(&token.render());
        cursor = span.stop;
    }
    out.push_str(&sql[cursor..]);
    out
}
