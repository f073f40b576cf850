//! URL slugs derived from titles and names

use crate::services::{ServiceError, ServiceResult};

/// Lowercase, hyphen-separated slug. Non-ASCII letters are kept; ASCII
/// punctuation and whitespace collapse into single hyphens.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !slug.is_empty() {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Use the explicit slug when given and non-blank, otherwise derive one.
/// Fails when the result normalizes to nothing.
pub fn slug_or_derive(explicit: Option<&str>, source: &str) -> ServiceResult<String> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => generate_slug(s),
        None => generate_slug(source),
    };
    if slug.is_empty() {
        return Err(ServiceError::validation("Slug cannot be empty"));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: a guide!  "), "rust-axum-a-guide");
        assert_eq!(generate_slug("snake_case_name"), "snake-case-name");
        assert_eq!(generate_slug("---"), "");
    }

    #[test]
    fn test_non_ascii_kept() {
        assert_eq!(generate_slug("Café Olé"), "café-olé");
        assert_eq!(generate_slug("技术 博客"), "技术-博客");
    }

    #[test]
    fn test_slug_or_derive() {
        assert_eq!(slug_or_derive(Some("My Slug"), "ignored").unwrap(), "my-slug");
        assert_eq!(slug_or_derive(Some("  "), "From Title").unwrap(), "from-title");
        assert_eq!(slug_or_derive(None, "From Title").unwrap(), "from-title");
        assert!(matches!(
            slug_or_derive(Some("!!!"), "From Title"),
            Err(ServiceError::Validation(_))
        ));
        assert!(slug_or_derive(None, "---").is_err());
    }

    proptest! {
        #[test]
        fn prop_slug_shape(text in ".{0,60}") {
            let slug = generate_slug(&text);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.chars().any(|c| c.is_whitespace()));
        }

        #[test]
        fn prop_slug_idempotent(text in "[a-zA-Z0-9 _!-]{0,40}") {
            let once = generate_slug(&text);
            prop_assert_eq!(generate_slug(&once), once);
        }
    }
}
