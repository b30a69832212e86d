//! Placeholder interpolation for document text and string literals.
//!
//! | Sequence        | Meaning                                         |
//! |-----------------|-------------------------------------------------|
//! | `{{name}}`      | Value of `name`                                 |
//! | `{{user.name}}` | Property path, index, or any expression         |
//! | `${name}`       | Same, dollar-brace form                         |
//!
//! A placeholder the resolver cannot answer is left in the output exactly as
//! written, as is an opening marker with no closing brace.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;

const OPEN_BRACES: usize = 0;

fn markers() -> &'static AhoCorasick {
    static MARKERS: OnceLock<AhoCorasick> = OnceLock::new();
    MARKERS.get_or_init(|| AhoCorasick::new(["{{", "${"]))
}

/// `true` if `src` contains anything [`interpolate`] would look at.
pub fn has_placeholders(src: &str) -> bool {
    markers().is_match(src)
}

/// Replace every placeholder in `src` with what `resolve` returns for its
/// trimmed body.
pub fn interpolate(src: &str, resolve: &mut dyn FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;

    while let Some(m) = markers().find(&src[cursor..]) {
        let start = cursor + m.start();
        let body_start = cursor + m.end();
        let close = if m.pattern() == OPEN_BRACES { "}}" } else { "}" };

        out.push_str(&src[cursor..start]);
        let Some(len) = src[body_start..].find(close) else {
            // Unterminated: the rest is literal.
            out.push_str(&src[start..]);
            return out;
        };
        let body_end = body_start + len;
        let after = body_end + close.len();
        let body = src[body_start..body_end].trim();

        match (!body.is_empty()).then(|| resolve(body)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(&src[start..after]),
        }
        cursor = after;
    }

    out.push_str(&src[cursor..]);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
