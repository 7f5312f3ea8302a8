//! Scripture reference parsing ("Book chapter:verse")

/// A reference split into book, chapter, and verse span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub book: String,
    pub chapter: u32,
    /// Verse or verse range as written ("16", "4-7"); `None` for whole chapters.
    pub verse: Option<String>,
}

/// Parse references like `John 3:16`, `1 Corinthians 13:4-7` or `Psalm 23`.
///
/// The last whitespace-separated token must start with the chapter number;
/// everything before it is the book.
pub fn parse_reference(reference: &str) -> Option<ParsedReference> {
    let trimmed = reference.trim();
    let (book, location) = trimmed.rsplit_once(char::is_whitespace)?;
    let book = book.trim();
    if book.is_empty() || !book.chars().any(char::is_alphabetic) {
        return None;
    }

    let (chapter, verse) = match location.split_once(':') {
        Some((c, v)) => (c, Some(v.trim())),
        None => (location, None),
    };
    let chapter = chapter.trim().parse::<u32>().ok()?;
    let verse = match verse {
        Some("") => return None,
        Some(v) => Some(v.to_string()),
        None => None,
    };

    Some(ParsedReference {
        book: book.split_whitespace().collect::<Vec<_>>().join(" "),
        chapter,
        verse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_verse() {
        let parsed = parse_reference("John 3:16").unwrap();
        assert_eq!(parsed.book, "John");
        assert_eq!(parsed.chapter, 3);
        assert_eq!(parsed.verse.as_deref(), Some("16"));
    }

    #[test]
    fn numbered_book_with_range() {
        let parsed = parse_reference("1 Corinthians 13:4-7").unwrap();
        assert_eq!(parsed.book, "1 Corinthians");
        assert_eq!(parsed.chapter, 13);
        assert_eq!(parsed.verse.as_deref(), Some("4-7"));
    }

    #[test]
    fn whole_chapter() {
        let parsed = parse_reference("  Psalm   23 ").unwrap();
        assert_eq!(parsed.book, "Psalm");
        assert_eq!(parsed.chapter, 23);
        assert_eq!(parsed.verse, None);
    }

    #[test]
    fn rejects_malformed_references() {
        assert_eq!(parse_reference("Genesis"), None);
        assert_eq!(parse_reference("Genesis one"), None);
        assert_eq!(parse_reference("3 16"), None);
        assert_eq!(parse_reference("John 3:"), None);
    }
}
