//! File and folder names safe to hand to the device.

/// Fallback for names that sanitize to nothing.
pub const UNTITLED: &str = "untitled";

/// Makes `name` safe to use as a device folder or file name.
///
/// Path separators become `-`; leading and trailing dots and spaces are
/// removed. A name with nothing left is [`UNTITLED`].
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    let replaced = trimmed.replace(['/', '\\'], "-");
    let cleaned = replaced.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Upload file name for an episode label.
#[must_use]
pub fn archive_file_name(label: &str) -> String {
    format!("{}.cbz", sanitize_file_name(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("Fate/Zero"), "Fate-Zero");
        assert_eq!(sanitize_file_name(r"a\b"), "a-b");
    }

    #[test]
    fn test_sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_file_name("  ..Title.. "), "Title");
        assert_eq!(sanitize_file_name("Vol. 1"), "Vol. 1");
    }

    #[test]
    fn test_sanitize_empty_becomes_untitled() {
        assert_eq!(sanitize_file_name(""), UNTITLED);
        assert_eq!(sanitize_file_name("   "), UNTITLED);
        assert_eq!(sanitize_file_name(" ... "), UNTITLED);
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("Volume 1, Chapter 2 - A/B"),
            "Volume 1, Chapter 2 - A-B.cbz"
        );
    }
}
