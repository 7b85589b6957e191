mod support;

use sqlcloak::binder::context::{StatementContext, ValueExpr};
use sqlcloak::binder::insert::{bind, BindError};

use support::bind as bind_ok;

#[test]
fn assignment_spans_cover_exactly_the_clause_pieces() {
    let sql = "INSERT INTO t (a, b, c) VALUES (1, 2, 3) \
               ON DUPLICATE KEY UPDATE a = 1, b = VALUES(b), c = ?";
    let StatementContext::Insert(insert) = bind_ok(sql);
    let pieces: Vec<&str> = insert
        .on_duplicate_key
        .iter()
        .map(|segment| segment.span.slice(sql))
        .collect();
    assert_eq!(pieces, ["a = 1", "b = VALUES(b)", "c = ?"]);
    assert!(insert
        .on_duplicate_key
        .windows(2)
        .all(|pair| pair[0].span.stop <= pair[1].span.start));
}

#[test]
fn values_argument_may_be_qualified() {
    let sql = "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = VALUES(t.a)";
    let StatementContext::Insert(insert) = bind_ok(sql);
    assert_eq!(
        insert.on_duplicate_key[0].value.as_values_self_reference(),
        Some("a")
    );
}

#[test]
fn commas_inside_function_arguments_do_not_split_assignments() {
    let sql = "INSERT INTO t (a, b) VALUES (1, 2) \
               ON DUPLICATE KEY UPDATE a = VALUES(a), b = COALESCE(b, a)";
    let StatementContext::Insert(insert) = bind_ok(sql);
    assert_eq!(insert.on_duplicate_key.len(), 2);
    assert_eq!(
        insert.on_duplicate_key[1].span.slice(sql),
        "b = COALESCE(b, a)"
    );
    match &insert.on_duplicate_key[1].value {
        ValueExpr::Function { name, args, .. } => {
            assert_eq!(name, "coalesce");
            assert_eq!(args, &["b".to_string(), "a".to_string()]);
        }
        other => panic!("expected function value, got {other:?}"),
    }
}

#[test]
fn escaped_quote_inside_literal_does_not_derail_the_scan() {
    let sql = "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = 'it\\'s, fine'";
    let StatementContext::Insert(insert) = bind_ok(sql);
    assert_eq!(insert.on_duplicate_key.len(), 1);
    assert_eq!(
        insert.on_duplicate_key[0].span.slice(sql),
        "a = 'it\\'s, fine'"
    );
}

#[test]
fn update_statements_are_rejected() {
    let err = bind("UPDATE t SET a = 1", None).expect_err("not an insert");
    assert!(matches!(err, BindError::UnsupportedStatement { kind } if kind == "UPDATE"));
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(
        bind("", None),
        Err(BindError::ExpectedSingleStatement { found: 0 })
    ));
}
