//! SQL helper functions for `SQLite` backends.
//!
//! Provides LIKE wildcard escaping so user-supplied substrings are always
//! used as literal text in keyword-search queries.

/// Escapes SQL LIKE wildcards in a string to make them literal.
///
/// SQL LIKE uses `%` (match any characters) and `_` (match single character)
/// as wildcards. When searching for literal `%` or `_` characters, they must
/// be escaped with a backslash. The backslash itself also needs escaping.
///
/// # Examples
///
/// ```
/// use subcog_graph::storage::sqlite::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
/// assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_percent_and_underscore() {
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
    }

    #[test]
    fn escapes_backslash_first() {
        assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_like_wildcards("Alice"), "Alice");
    }
}
