mod support;

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use sqlcloak::binder::context::PlainValue;
use sqlcloak::rewrite::generator::SqlRewriteEngine;
use sqlcloak::rewrite::token::RewriteToken;
use sqlcloak::rule::config::EncryptRuleConfig;
use sqlcloak::rule::policy::EncryptRule;

use support::{bind, splice};

fn aes_rule_json() -> String {
    let key = URL_SAFE_NO_PAD.encode([42u8; 32]);
    format!(
        r#"{{
          "encryptors": {{
            "name_encryptor": {{ "type": "aes-gcm-siv", "props": {{ "key": "{key}" }} }}
          }},
          "tables": {{
            "t": {{
              "columns": {{
                "name": {{
                  "cipherColumn": "name_cipher",
                  "assistedQueryColumn": "name_assisted",
                  "encryptorName": "name_encryptor"
                }}
              }}
            }}
          }}
        }}"#
    )
}

#[test]
fn configured_aes_rule_rewrites_and_decrypts_round_trip() {
    let config = EncryptRuleConfig::from_json(&aes_rule_json()).unwrap();
    let rule = Arc::new(EncryptRule::from_config(&config).unwrap());

    let sql = "INSERT INTO t (id, name) VALUES (1, 'lu') ON DUPLICATE KEY UPDATE name = 'wu'";
    let engine = SqlRewriteEngine::new(Arc::clone(&rule));
    let tokens = engine.generate_tokens(&bind(sql)).unwrap();
    assert_eq!(tokens.len(), 1);

    let RewriteToken::Literal(token) = &tokens[0] else {
        panic!("expected literal token, got {:?}", tokens[0]);
    };
    let assignments = token.assignments();
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].0, "name_cipher");
    assert_eq!(assignments[1].0, "name_assisted");

    // The emitted cipher value is the deterministic transform of 'wu'.
    let expected = rule
        .encrypt_cipher_values(None, "t", "name", &[PlainValue::Text("wu".into())])
        .unwrap();
    assert_eq!(assignments[0].1, expected[0]);

    // And it decrypts back to the original plaintext.
    let PlainValue::Text(cipher_value) = &assignments[0].1 else {
        panic!("cipher value should be text");
    };
    assert_eq!(
        rule.decrypt_value(None, "t", "name", cipher_value).unwrap(),
        Some("wu".to_string())
    );

    let rewritten = splice(sql, &tokens);
    assert!(rewritten.contains("name_cipher = 'v1."));
    assert!(rewritten.contains("name_assisted = '"));
    assert!(!rewritten.contains("'wu'"));
}

#[test]
fn schema_pinned_table_rule_only_matches_that_schema() {
    let key = URL_SAFE_NO_PAD.encode([42u8; 32]);
    let json = format!(
        r#"{{
          "encryptors": {{
            "e": {{ "type": "aes-gcm-siv", "props": {{ "key": "{key}" }} }}
          }},
          "tables": {{
            "t": {{
              "schema": "s1",
              "columns": {{
                "name": {{ "cipherColumn": "name_cipher", "encryptorName": "e" }}
              }}
            }}
          }}
        }}"#
    );
    let config = EncryptRuleConfig::from_json(&json).unwrap();
    let rule = EncryptRule::from_config(&config).unwrap();
    assert!(rule.find_policy(Some("s1"), "t", "name").is_some());
    assert!(rule.find_policy(Some("s2"), "t", "name").is_none());
    assert!(rule.find_policy(None, "t", "name").is_none());
}
