//! Shell-glob key matching for `keys_match` and dump redaction
//!
//! `*` matches any run of characters, `?` one character, `[...]` a character
//! class. A pattern containing none of `* ? [ ]` is an exact match.

/// Match `key` against a shell-glob `pattern`. An empty pattern matches nothing.
pub(crate) fn matches(key: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    if !pattern.contains(['*', '?', '[', ']']) {
        return key == pattern;
    }

    match glob::Pattern::new(pattern) {
        Ok(p) => p.matches(key),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn test_literal_patterns_match_exactly() {
        assert!(matches("user.token", "user.token"));
        assert!(!matches("user.token", "user"));
        assert!(!matches("user", "user.token"));
    }

    #[test]
    fn test_star_matches_any_run() {
        assert!(matches("user.token", "user.*"));
        assert!(matches("user.profile.name", "user.*"));
        assert!(matches("anything", "*"));
        assert!(!matches("admin.token", "user.*"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(matches("key1", "key?"));
        assert!(!matches("key12", "key?"));
        assert!(!matches("key", "key?"));
    }

    #[test]
    fn test_character_classes() {
        assert!(matches("key1", "key[0-9]"));
        assert!(matches("keyb", "key[abc]"));
        assert!(!matches("keyz", "key[abc]"));
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        assert!(!matches("", ""));
        assert!(!matches("key", ""));
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        assert!(!matches("key", "key["));
    }
}
