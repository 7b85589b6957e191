use sqlparser::ast::{
    Assignment, AssignmentTarget, Expr, FunctionArg, FunctionArgExpr, FunctionArguments,
    ObjectName, OnInsert, Statement, Value,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::binder::context::{
    AssignmentSegment, ColumnRef, InsertStatementContext, PlainValue, Span, StatementContext,
    ValueExpr,
};
use crate::binder::names::{normalize_identifier, unquote_identifier};

/// Errors raised while binding a SQL statement into a [`StatementContext`].
#[derive(Debug, Error)]
pub enum BindError {
    /// The statement text failed to parse.
    #[error("failed to parse SQL statement")]
    Parse(#[from] sqlparser::parser::ParserError),
    /// The input contained zero or several statements.
    #[error("expected exactly one statement, found {found}")]
    ExpectedSingleStatement {
        /// Number of statements actually parsed.
        found: usize,
    },
    /// The statement is not one this binder understands.
    #[error("unsupported statement kind `{kind}`")]
    UnsupportedStatement {
        /// Leading keyword of the offending statement.
        kind: String,
    },
    /// An assignment targets something other than a single column.
    #[error("unsupported assignment target `{target}`")]
    UnsupportedAssignmentTarget {
        /// Rendered target text.
        target: String,
    },
    /// An assignment value has a shape outside the closed [`ValueExpr`] sum.
    #[error("unsupported value expression `{expression}`")]
    UnsupportedExpression {
        /// Rendered expression text.
        expression: String,
    },
    /// The raw clause text could not be matched back to the parsed statement.
    #[error("failed to locate clause text: {detail}")]
    ClauseScan {
        /// What went wrong while scanning.
        detail: String,
    },
}

/// Bind one MySQL statement into a [`StatementContext`].
///
/// `default_schema` qualifies unqualified table names, mirroring the session
/// schema a middleware connection would carry.
pub fn bind(sql: &str, default_schema: Option<&str>) -> Result<StatementContext, BindError> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(BindError::ExpectedSingleStatement {
            found: statements.len(),
        });
    }
    match statements.remove(0) {
        Statement::Insert(insert) => bind_insert(sql, default_schema, insert),
        other => Err(BindError::UnsupportedStatement {
            kind: statement_kind(&other),
        }),
    }
}

fn bind_insert(
    sql: &str,
    default_schema: Option<&str>,
    insert: sqlparser::ast::Insert,
) -> Result<StatementContext, BindError> {
    let (schema, table) = schema_and_table(&insert.table_name, default_schema);
    let assignments = match insert.on {
        Some(OnInsert::DuplicateKeyUpdate(assignments)) => assignments,
        _ => Vec::new(),
    };
    let on_duplicate_key = if assignments.is_empty() {
        Vec::new()
    } else {
        let spans = scan_on_duplicate_segments(sql)?;
        if spans.len() != assignments.len() {
            return Err(BindError::ClauseScan {
                detail: format!(
                    "found {} assignment spans for {} parsed assignments",
                    spans.len(),
                    assignments.len()
                ),
            });
        }
        assignments
            .into_iter()
            .zip(spans)
            .map(|(assignment, span)| bind_assignment(sql, assignment, span))
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(StatementContext::Insert(InsertStatementContext {
        schema,
        table,
        on_duplicate_key,
    }))
}

fn bind_assignment(
    sql: &str,
    assignment: Assignment,
    span: Span,
) -> Result<AssignmentSegment, BindError> {
    let name = match &assignment.target {
        AssignmentTarget::ColumnName(name) => last_ident(name),
        other => {
            return Err(BindError::UnsupportedAssignmentTarget {
                target: other.to_string(),
            })
        }
    };
    let column = ColumnRef {
        name,
        span: Span::new(span.start, column_identifier_end(sql, span.start)),
    };
    let value = bind_value(assignment.value, value_span_within(sql, span))?;
    Ok(AssignmentSegment {
        column,
        value,
        span,
    })
}

fn bind_value(expr: Expr, span: Span) -> Result<ValueExpr, BindError> {
    match expr {
        Expr::Value(Value::Placeholder(_)) => Ok(ValueExpr::Parameter { span }),
        Expr::Value(value) => Ok(ValueExpr::Literal {
            value: bind_literal(value)?,
            span,
        }),
        Expr::Function(func) => Ok(ValueExpr::Function {
            name: last_ident(&func.name),
            args: function_column_args(&func.args),
            span,
        }),
        other => Err(BindError::UnsupportedExpression {
            expression: other.to_string(),
        }),
    }
}

fn bind_literal(value: Value) -> Result<PlainValue, BindError> {
    match value {
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Ok(PlainValue::Text(s)),
        Value::Number(n, _) => Ok(PlainValue::Number(n)),
        Value::Boolean(b) => Ok(PlainValue::Bool(b)),
        Value::Null => Ok(PlainValue::Null),
        other => Err(BindError::UnsupportedExpression {
            expression: other.to_string(),
        }),
    }
}

/// Collect the arguments of a call that are plain column references.
fn function_column_args(args: &FunctionArguments) -> Vec<String> {
    let FunctionArguments::List(list) = args else {
        return Vec::new();
    };
    list.args
        .iter()
        .filter_map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::Identifier(ident))) => {
                Some(normalize_identifier(&ident.value))
            }
            FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::CompoundIdentifier(parts))) => {
                parts.last().map(|ident| normalize_identifier(&ident.value))
            }
            _ => None,
        })
        .collect()
}

fn schema_and_table(
    name: &ObjectName,
    default_schema: Option<&str>,
) -> (Option<String>, String) {
    let table = name
        .0
        .last()
        .map(|ident| normalize_identifier(&ident.value))
        .unwrap_or_default();
    let schema = if name.0.len() >= 2 {
        Some(normalize_identifier(&name.0[name.0.len() - 2].value))
    } else {
        default_schema.map(normalize_identifier)
    };
    (schema, table)
}

fn last_ident(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| unquote_identifier(&ident.value).to_string())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Byte spans of each `column = expression` piece of the
/// `ON DUPLICATE KEY UPDATE` clause, recovered from the raw statement text.
///
/// The scan tracks quoting and parenthesis state and skips comment regions,
/// so keyword sequences inside string literals or comments never anchor the
/// clause and commas inside call arguments never split a segment.
fn scan_on_duplicate_segments(sql: &str) -> Result<Vec<Span>, BindError> {
    let clause_start = on_duplicate_clause_start(sql).ok_or_else(|| BindError::ClauseScan {
        detail: "ON DUPLICATE KEY UPDATE clause not found in statement text".to_string(),
    })?;
    let mut end = sql.len();
    while end > clause_start {
        let c = sql.as_bytes()[end - 1];
        if c == b';' || c.is_ascii_whitespace() {
            end -= 1;
        } else {
            break;
        }
    }
    Ok(split_assignments(sql, clause_start, end))
}

/// Offset just past the `UPDATE` keyword of the first unquoted
/// `ON DUPLICATE KEY UPDATE` word sequence.
fn on_duplicate_clause_start(sql: &str) -> Option<usize> {
    const CLAUSE: [&str; 4] = ["on", "duplicate", "key", "update"];
    let words = bare_words(sql);
    words.windows(4).find_map(|window| {
        let matched = window
            .iter()
            .zip(CLAUSE)
            .all(|(&(start, stop), keyword)| sql[start..stop].eq_ignore_ascii_case(keyword));
        matched.then(|| window[3].1)
    })
}

/// Maximal identifier-character runs outside quotes and comments, with their
/// byte spans.
fn bare_words(sql: &str) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut in_single = false;
    let mut in_backtick = false;
    let mut current: Option<usize> = None;
    while let Some((idx, ch)) = chars.next() {
        if in_single {
            if ch == '\\' {
                chars.next();
            } else if ch == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_backtick {
            if ch == '`' {
                in_backtick = false;
            }
            continue;
        }
        match ch {
            '\'' => {
                current = None;
                in_single = true;
            }
            '`' => {
                current = None;
                in_backtick = true;
            }
            '-' if chars.peek().is_some_and(|&(_, n)| n == '-') => {
                current = None;
                skip_line_comment(&mut chars);
            }
            '#' => {
                current = None;
                skip_line_comment(&mut chars);
            }
            '/' if chars.peek().is_some_and(|&(_, n)| n == '*') => {
                current = None;
                chars.next();
                let mut star = false;
                for (_, n) in chars.by_ref() {
                    if star && n == '/' {
                        break;
                    }
                    star = n == '*';
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '$' => {
                if current.is_none() {
                    current = Some(idx);
                }
                let next_is_word = chars
                    .peek()
                    .is_some_and(|&(_, n)| n.is_ascii_alphanumeric() || n == '_' || n == '$');
                if !next_is_word {
                    if let Some(start) = current.take() {
                        words.push((start, idx + ch.len_utf8()));
                    }
                }
            }
            _ => current = None,
        }
    }
    words
}

fn skip_line_comment(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    for (_, n) in chars.by_ref() {
        if n == '\n' {
            break;
        }
    }
}

/// Split `sql[start..end]` at top-level commas, trimming each piece.
fn split_assignments(sql: &str, start: usize, end: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut in_single = false;
    let mut in_backtick = false;
    let mut depth = 0usize;
    let mut piece_start = start;
    let mut chars = sql[start..end].char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        let idx = start + offset;
        if in_single {
            if ch == '\\' {
                chars.next();
            } else if ch == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_backtick {
            if ch == '`' {
                in_backtick = false;
            }
            continue;
        }
        match ch {
            '\'' => in_single = true,
            '`' => in_backtick = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if let Some(span) = trimmed_span(sql, piece_start, idx) {
                    spans.push(span);
                }
                piece_start = idx + 1;
            }
            _ => {}
        }
    }
    if let Some(span) = trimmed_span(sql, piece_start, end) {
        spans.push(span);
    }
    spans
}

fn trimmed_span(sql: &str, mut start: usize, mut stop: usize) -> Option<Span> {
    let bytes = sql.as_bytes();
    while start < stop && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    while stop > start && bytes[stop - 1].is_ascii_whitespace() {
        stop -= 1;
    }
    (start < stop).then_some(Span::new(start, stop))
}

/// End offset of the (possibly backticked, possibly qualified) assignment
/// target starting at `start`.
fn column_identifier_end(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut i = start;
    loop {
        if i < sql.len() && bytes[i] == b'`' {
            i = match sql[i + 1..].find('`') {
                Some(offset) => i + 1 + offset + 1,
                None => sql.len(),
            };
        } else {
            while i < sql.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
        }
        if i < sql.len() && bytes[i] == b'.' {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Span of the value expression inside one `column = expression` segment.
fn value_span_within(sql: &str, segment: Span) -> Span {
    let mut in_backtick = false;
    let mut eq = segment.start;
    for (offset, ch) in segment.slice(sql).char_indices() {
        match ch {
            '`' => in_backtick = !in_backtick,
            '=' if !in_backtick => {
                eq = segment.start + offset;
                break;
            }
            _ => {}
        }
    }
    let bytes = sql.as_bytes();
    let mut start = eq + 1;
    while start < segment.stop && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    Span::new(start, segment.stop)
}
