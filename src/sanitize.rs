/// Characters rejected by at least one common file system.
const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest file stem we hand to the file system.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Turns a video title into something safe to use as a file stem.
///
/// Illegal characters are dropped, the result is cut to
/// [`MAX_FILENAME_CHARS`] characters and surrounding whitespace is trimmed.
/// The result may be empty.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c))
        .take(MAX_FILENAME_CHARS)
        .collect();
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_every_illegal_character() {
        let out = sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#);
        assert_eq!(out, "abcdefghij");
        assert!(!out.chars().any(|c| ILLEGAL_CHARS.contains(&c)));
    }

    #[test]
    fn truncates_long_titles() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "가".repeat(300);
        let out = sanitize_filename(&long);
        assert_eq!(out.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_filename("  My Video  "), "My Video");
        assert_eq!(sanitize_filename(" ??? "), "");
    }
}
