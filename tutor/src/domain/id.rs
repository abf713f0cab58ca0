//! Record id generation and resolution
//!
//! All ids use the format: `{6-char-hex}-{kind}-{slug}`
//! Example: `019a42-request-kubernetes`

/// Generate a record id from kind and title
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(title);
    format!("{}-{}-{}", hex_prefix, kind, slug)
}

/// Slugify a title for use in ids
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None // Strip apostrophes (straight and curly)
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve a partial id reference against a set of known ids
///
/// Returns:
/// - Ok(Some(id)) if exactly one match
/// - Ok(None) if no matches
/// - Err with candidates if ambiguous
pub fn resolve_reference<'a>(ids: impl IntoIterator<Item = &'a str>, reference: &str) -> Result<Option<String>, Vec<String>> {
    let matches: Vec<String> = ids
        .into_iter()
        .filter(|id| id_matches(id, reference))
        .map(|id| id.to_string())
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.into_iter().next().unwrap())),
        _ => Err(matches),
    }
}

/// Check if an id matches a reference (exact, prefix, or slug-contains)
fn id_matches(id: &str, reference: &str) -> bool {
    if id == reference || id.starts_with(reference) {
        return true;
    }

    if let Some(slug_start) = id.find('-') {
        let slug_part = &id[slug_start + 1..];
        if slug_part.contains(reference) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("request", "Learn Kubernetes Basics");
        assert!(id.len() > 10);
        assert!(id.contains("-request-"));
        assert!(id.contains("learn-kubernetes-basics"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Rust!"), "rust");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("here's a test"), "heres-a-test");
    }

    #[test]
    fn test_resolve_exact() {
        let ids = ["019a42-request-kubernetes", "019a43-plan-kubernetes"];
        assert_eq!(
            resolve_reference(ids, "019a42-request-kubernetes").unwrap(),
            Some("019a42-request-kubernetes".to_string())
        );
    }

    #[test]
    fn test_resolve_hex_prefix() {
        let ids = ["019a42-request-kubernetes", "019a43-plan-kubernetes"];
        assert_eq!(
            resolve_reference(ids, "019a42").unwrap(),
            Some("019a42-request-kubernetes".to_string())
        );
    }

    #[test]
    fn test_resolve_slug_match() {
        let ids = ["019a42-request-kubernetes", "019a43-request-rust"];
        assert_eq!(
            resolve_reference(ids, "rust").unwrap(),
            Some("019a43-request-rust".to_string())
        );
    }

    #[test]
    fn test_resolve_ambiguous() {
        let ids = ["019a42-request-kubernetes", "019a43-plan-kubernetes"];
        let result = resolve_reference(ids, "kubernetes");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn test_resolve_no_match() {
        let ids = ["019a42-request-kubernetes"];
        assert_eq!(resolve_reference(ids, "haskell").unwrap(), None);
    }
}
