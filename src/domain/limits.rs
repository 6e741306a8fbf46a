//! Field length limits, counted in chars.

pub const COMMENT_CONTENT_MAX: usize = 1000;
pub const AUTHOR_MIN: usize = 2;
pub const AUTHOR_MAX: usize = 50;

/// Deepest nesting a reply may have; a top-level comment sits at depth 1.
/// Keeps nested trees within the JSON codec recursion limit.
pub const MAX_REPLY_DEPTH: usize = 50;

pub const POST_TITLE_MAX: usize = 200;
pub const POST_CONTENT_MAX: usize = 10_000;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorError {
    Required,
    TooShort,
    TooLong,
}

/// Authors are shared by comments and posts: present, 2 to 50 chars once
/// surrounding whitespace is trimmed.
pub fn check_author(author: &str) -> Result<(), AuthorError> {
    let author = author.trim();
    if author.is_empty() {
        return Err(AuthorError::Required);
    }
    let len = char_len(author);
    if len < AUTHOR_MIN {
        return Err(AuthorError::TooShort);
    }
    if len > AUTHOR_MAX {
        return Err(AuthorError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_count_chars_not_bytes() {
        assert_eq!(char_len("héllo"), 5);
        assert_eq!(check_author("äö"), Ok(()));
        assert_eq!(check_author("ä"), Err(AuthorError::TooShort));
    }

    #[test]
    fn author_bounds() {
        assert_eq!(check_author("   "), Err(AuthorError::Required));
        assert_eq!(check_author(&"a".repeat(50)), Ok(()));
        assert_eq!(check_author(&"a".repeat(51)), Err(AuthorError::TooLong));
    }

    #[test]
    fn author_is_measured_after_trimming() {
        assert_eq!(check_author(" a"), Err(AuthorError::TooShort));
        assert_eq!(check_author("a \t"), Err(AuthorError::TooShort));
        assert_eq!(check_author(&format!("ab{}", " ".repeat(49))), Ok(()));
        assert_eq!(check_author(&format!("  {}  ", "a".repeat(50))), Ok(()));
    }
}
