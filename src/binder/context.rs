use serde::Serialize;
use std::fmt;

/// A half-open `[start, stop)` byte range into the original SQL text.
///
/// Every offset in this crate uses this one convention, so a splicer can cut
/// the original text with ordinary slice indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Span {
    /// Byte offset of the first character covered.
    pub start: usize,
    /// Byte offset one past the last character covered.
    pub stop: usize,
}

impl Span {
    /// Build a span from `start` (inclusive) and `stop` (exclusive).
    pub fn new(start: usize, stop: usize) -> Self {
        Span { start, stop }
    }

    /// The covered slice of `sql`.
    pub fn slice<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.stop]
    }

    /// Whether two spans cover at least one byte in common.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}

/// A plaintext SQL literal value, before any cipher transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlainValue {
    /// A string literal.
    Text(String),
    /// A numeric literal, kept in its source text form.
    Number(String),
    /// A boolean literal.
    Bool(bool),
    /// The SQL `NULL` literal.
    Null,
}

impl PlainValue {
    /// Textual form handed to an [`crate::rule::encryptor::Encryptor`].
    ///
    /// `Null` never reaches an encryptor; the value cipher service passes it
    /// through untransformed.
    pub fn as_text(&self) -> &str {
        match self {
            PlainValue::Text(s) | PlainValue::Number(s) => s,
            PlainValue::Bool(true) => "true",
            PlainValue::Bool(false) => "false",
            PlainValue::Null => "",
        }
    }

    /// Render this value as a SQL literal, quoting and escaping text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            PlainValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            PlainValue::Number(s) => s.clone(),
            PlainValue::Bool(true) => "TRUE".to_string(),
            PlainValue::Bool(false) => "FALSE".to_string(),
            PlainValue::Null => "NULL".to_string(),
        }
    }
}

impl fmt::Display for PlainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

/// A reference to a target column inside an assignment, with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Normalized (unquoted, lowercased) column name.
    pub name: String,
    /// Span of the column identifier in the original text.
    pub span: Span,
}

/// The value side of one `column = expression` assignment.
///
/// This is a closed sum: the binder rejects every other expression shape, so
/// generators can match exhaustively instead of silently falling through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    /// A bind-parameter placeholder (`?`).
    Parameter {
        /// Span of the placeholder in the original text.
        span: Span,
    },
    /// A literal value.
    Literal {
        /// The plaintext literal.
        value: PlainValue,
        /// Span of the literal in the original text.
        span: Span,
    },
    /// A function call whose arguments are plain column references.
    ///
    /// `VALUES(col)` — the insert-value self-reference — arrives as this
    /// variant with a single argument.
    Function {
        /// Function name as written (unquoted).
        name: String,
        /// Normalized column-reference arguments, left to right. Arguments
        /// that are not plain columns are not collected, so a `VALUES` call
        /// only counts as a self-reference when exactly one column survives.
        args: Vec<String>,
        /// Span of the whole call in the original text.
        span: Span,
    },
}

impl ValueExpr {
    /// The referenced column when this is a `VALUES(col)` self-reference.
    pub fn as_values_self_reference(&self) -> Option<&str> {
        match self {
            ValueExpr::Function { name, args, .. }
                if name.eq_ignore_ascii_case("VALUES") && args.len() == 1 =>
            {
                Some(&args[0])
            }
            _ => None,
        }
    }
}

/// One `column = expression` pair within an `ON DUPLICATE KEY UPDATE` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentSegment {
    /// The assignment target.
    pub column: ColumnRef,
    /// The assigned value expression.
    pub value: ValueExpr,
    /// Span of the whole `column = expression` text.
    pub span: Span,
}

/// Bound view of an `INSERT` statement, immutable for one rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatementContext {
    /// Schema qualifier, from the statement or the binder's default.
    pub schema: Option<String>,
    /// Normalized target table name.
    pub table: String,
    /// `ON DUPLICATE KEY UPDATE` assignments in source order; empty when the
    /// statement has no such clause.
    pub on_duplicate_key: Vec<AssignmentSegment>,
}

/// A bound statement handed to the rewrite engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementContext {
    /// A bound `INSERT` statement.
    Insert(InsertStatementContext),
}

impl StatementContext {
    /// Schema qualifier of the statement's target table, if any.
    pub fn schema(&self) -> Option<&str> {
        match self {
            StatementContext::Insert(insert) => insert.schema.as_deref(),
        }
    }

    /// Normalized target table name.
    pub fn table(&self) -> &str {
        match self {
            StatementContext::Insert(insert) => &insert.table,
        }
    }
}
