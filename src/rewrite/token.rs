//! Positionally-anchored replacement instructions.
//!
//! Tokens are data-only: each variant records which physical columns replace
//! the original assignment and what to assign them, and all SQL rendering
//! lives in [`RewriteToken::render`]. A token's span covers the whole
//! original `column = expression` text, so rendering always regenerates the
//! complete assignment list that replaces it.

use crate::binder::context::{PlainValue, Span};

/// Replaces `col = ?` with a placeholder assignment per physical column.
///
/// The column order (cipher, then assisted-query, then plain) is a contract
/// with downstream parameter binding, which must supply one value per listed
/// column in exactly that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAssignmentToken {
    span: Span,
    column_names: Vec<String>,
}

impl ParameterAssignmentToken {
    /// An empty token anchored at `span`.
    pub fn new(span: Span) -> Self {
        ParameterAssignmentToken {
            span,
            column_names: Vec::new(),
        }
    }

    /// Append a physical column to expand the placeholder into.
    pub fn add_column_name(&mut self, column: impl Into<String>) {
        self.column_names.push(column.into());
    }

    /// Physical columns in binding order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }
}

/// Replaces `col = literal` with per-column literal assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralAssignmentToken {
    span: Span,
    assignments: Vec<(String, PlainValue)>,
}

impl LiteralAssignmentToken {
    /// An empty token anchored at `span`.
    pub fn new(span: Span) -> Self {
        LiteralAssignmentToken {
            span,
            assignments: Vec::new(),
        }
    }

    /// Append a `(physical column, literal value)` pair.
    pub fn add_assignment(&mut self, column: impl Into<String>, value: PlainValue) {
        self.assignments.push((column.into(), value));
    }

    /// The `(column, value)` pairs in emission order.
    pub fn assignments(&self) -> &[(String, PlainValue)] {
        &self.assignments
    }
}

/// Replaces `col = VALUES(col)` with per-column rendered expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAssignmentToken {
    span: Span,
    assignments: Vec<(String, String)>,
}

impl FunctionAssignmentToken {
    /// An empty token anchored at `span`.
    pub fn new(span: Span) -> Self {
        FunctionAssignmentToken {
            span,
            assignments: Vec::new(),
        }
    }

    /// Append a `(physical column, rendered expression)` pair.
    pub fn add_assignment(&mut self, column: impl Into<String>, expression: impl Into<String>) {
        self.assignments.push((column.into(), expression.into()));
    }

    /// The `(column, expression)` pairs in emission order.
    pub fn assignments(&self) -> &[(String, String)] {
        &self.assignments
    }

    /// Whether no pair was rendered.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// A replacement instruction for one span of the original SQL text.
///
/// Tokens produced for one statement are non-overlapping and ordered by
/// ascending start offset; the splicer consumes them by cutting the original
/// text at token boundaries and copying untouched regions verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteToken {
    /// Expansion of a single `?` assignment.
    Parameter(ParameterAssignmentToken),
    /// Replacement of a literal assignment with cipher values.
    Literal(LiteralAssignmentToken),
    /// Replacement of a `VALUES(col)` self-reference assignment.
    Function(FunctionAssignmentToken),
}

impl RewriteToken {
    /// The half-open byte range this token replaces.
    pub fn span(&self) -> Span {
        match self {
            RewriteToken::Parameter(token) => token.span,
            RewriteToken::Literal(token) => token.span,
            RewriteToken::Function(token) => token.span,
        }
    }

    /// Render the replacement text for this token's span.
    pub fn render(&self) -> String {
        match self {
            RewriteToken::Parameter(token) => token
                .column_names
                .iter()
                .map(|column| format!("{column} = ?"))
                .collect::<Vec<_>>()
                .join(", "),
            RewriteToken::Literal(token) => token
                .assignments
                .iter()
                .map(|(column, value)| format!("{column} = {}", value.to_sql_literal()))
                .collect::<Vec<_>>()
                .join(", "),
            RewriteToken::Function(token) => token
                .assignments
                .iter()
                .map(|(column, expression)| format!("{column} = {expression}"))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_token_renders_one_placeholder_per_column() {
        let mut token = ParameterAssignmentToken::new(Span::new(0, 8));
        token.add_column_name("name_cipher");
        token.add_column_name("name_assisted");
        token.add_column_name("name_plain");
        assert_eq!(
            RewriteToken::Parameter(token).render(),
            "name_cipher = ?, name_assisted = ?, name_plain = ?"
        );
    }

    #[test]
    fn literal_token_quotes_text_and_keeps_numbers_bare() {
        let mut token = LiteralAssignmentToken::new(Span::new(0, 8));
        token.add_assignment("name_cipher", PlainValue::Text("enc".into()));
        token.add_assignment("version", PlainValue::Number("2".into()));
        assert_eq!(
            RewriteToken::Literal(token).render(),
            "name_cipher = 'enc', version = 2"
        );
    }

    #[test]
    fn function_token_renders_expressions_verbatim() {
        let mut token = FunctionAssignmentToken::new(Span::new(0, 8));
        token.add_assignment("name_cipher", "VALUES(name_cipher)");
        assert_eq!(
            RewriteToken::Function(token).render(),
            "name_cipher = VALUES(name_cipher)"
        );
    }
}
