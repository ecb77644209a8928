/// Turn free text into a URL slug: lowercase ASCII alphanumerics joined by single dashes.
///
/// Anything outside `[a-z0-9]` after lowercasing (including non-ASCII letters)
/// collapses into a separator. Leading and trailing separators are dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Slugs the server hands out to freshly created, still untitled drafts.
pub fn is_placeholder_slug(slug: &str) -> bool {
    slug.is_empty() || slug.starts_with("draft-")
}
