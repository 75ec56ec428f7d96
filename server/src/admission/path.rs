//! Path normalization and skip-list matching.
//!
//! Skip rules operate on canonical paths only, so a traversal like
//! `/healthz/../../api/auth/login` cannot masquerade as an exempt probe.

/// Canonicalizes a raw request path.
///
/// Drops the query and fragment, collapses duplicate slashes, resolves `.`
/// and `..` segments, and always returns an absolute path (`/` for empty
/// input). `..` pops the last retained segment instead of being emitted.
pub fn normalize_path(raw: &str) -> String {
    let path = raw
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    normalized.push_str(&segments.join("/"));
    normalized
}

/// Returns true if a normalized path is exempt from admission control.
///
/// A pattern matches on exact equality, or, when it ends in `/*`, when the
/// path equals the prefix or starts with `prefix + "/"`. Plain prefix
/// containment is deliberately not a match: `/healthz` must not exempt
/// `/healthz-admin`.
pub fn is_exempt(normalized: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let prefix = normalize_path(prefix);
            normalized == prefix || normalized.starts_with(&format!("{prefix}/"))
        } else {
            normalized == normalize_path(pattern)
        }
    })
}
