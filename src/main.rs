//! CLI entry point for `sqlcloak`.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use sqlcloak::binder::insert;
use sqlcloak::rewrite::generator::SqlRewriteEngine;
use sqlcloak::rewrite::token::RewriteToken;
use sqlcloak::rule::config::EncryptRuleConfig;
use sqlcloak::rule::policy::EncryptRule;

#[derive(Parser)]
#[command(
    name = "sqlcloak",
    about = "Rewrite SQL statements for transparent column-level encryption"
)]
struct Cli {
    /// SQL statement to rewrite
    sql: String,

    /// Encrypt rule configuration (JSON)
    #[arg(long)]
    rule: PathBuf,

    /// Default schema for unqualified table names
    #[arg(long)]
    schema: Option<String>,

    /// Print the token list as JSON instead of the rewritten statement
    #[arg(long)]
    tokens: bool,
}

fn main() {
    let cli = Cli::parse();

    let config_json = match std::fs::read_to_string(&cli.rule) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error reading rule configuration: {e}");
            process::exit(2);
        }
    };
    let config = match EncryptRuleConfig::from_json(&config_json) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error parsing rule configuration: {e}");
            process::exit(2);
        }
    };
    let rule = match EncryptRule::from_config(&config) {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Error building encrypt rule: {e}");
            process::exit(2);
        }
    };

    let context = match insert::bind(&cli.sql, cli.schema.as_deref()) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error binding statement: {e}");
            process::exit(1);
        }
    };

    let engine = SqlRewriteEngine::new(Arc::new(rule));
    let tokens = match engine.generate_tokens(&context) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Statement rejected: {e}");
            process::exit(1);
        }
    };

    if cli.tokens {
        let listing: Vec<_> = tokens.iter().map(token_json).collect();
        match serde_json::to_string_pretty(&listing) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("Error rendering token listing: {e}");
                process::exit(1);
            }
        }
    } else {
        println!("{}", splice(&cli.sql, &tokens));
    }
}

fn token_json(token: &RewriteToken) -> serde_json::Value {
    let kind = match token {
        RewriteToken::Parameter(_) => "parameter",
        RewriteToken::Literal(_) => "literal",
        RewriteToken::Function(_) => "function",
    };
    json!({
        "kind": kind,
        "span": token.span(),
        "replacement": token.render(),
    })
}

/// Apply tokens in ascending span order, copying untouched regions verbatim.
fn splice(sql: &str, tokens: &[RewriteToken]) -> String {
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
