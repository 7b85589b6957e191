/// Return the identifier without surrounding backticks or double quotes.
pub fn unquote_identifier(ident: &str) -> &str {
    for quote in ['`', '"'] {
        if let Some(inner) = ident
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    ident
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes surrounding quotes on a single identifier, and
/// lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_handles_backticks_and_double_quotes() {
        assert_eq!(unquote_identifier("`name`"), "name");
        assert_eq!(unquote_identifier("\"name\""), "name");
        assert_eq!(unquote_identifier("name"), "name");
        assert_eq!(unquote_identifier("`unterminated"), "`unterminated");
    }

    #[test]
    fn normalize_trims_unquotes_and_lowercases() {
        assert_eq!(normalize_identifier("  `User_Name` "), "user_name");
        assert_eq!(normalize_identifier("NAME"), "name");
    }
}
