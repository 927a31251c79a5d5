//! Honeypot field check.
//!
//! The form carries a field that humans never see. Anything typed into it
//! marks the submission as automated.

/// Field name used when none is configured.
pub const DEFAULT_HONEYPOT_FIELD: &str = "website";

/// Returns `true` (block) iff the hidden field holds non-whitespace content.
pub fn is_triggered(value: &str) -> bool {
    !value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_passes() {
        assert!(!is_triggered(""));
    }

    #[test]
    fn test_whitespace_only_passes() {
        assert!(!is_triggered("   \t\n "));
    }

    #[test]
    fn test_any_content_blocks() {
        assert!(is_triggered("bot-input"));
        assert!(is_triggered("  http://spam.example  "));
        assert!(is_triggered("."));
    }
}
