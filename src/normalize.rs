//! Label normalization for sink identifiers.

/// Normalizes a label into an identifier usable by external sinks.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, runs of `_` collapse into one and
/// leading/trailing `_` are trimmed. The mapping is idempotent but not injective: `"a b"` and
/// `"a-b"` both become `"a_b"`.
pub fn normalize(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_labels() {
        let cases = [
            ("test", "test"),
            ("foo__bar", "foo_bar"),
            ("!foo1?:bar2!:", "foo1_bar2"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_normalize_degenerate_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("___"), "");
        assert_eq!(normalize("?!"), "");
        assert_eq!(normalize("héllo wörld"), "h_llo_w_rld");
    }

    #[test]
    fn test_normalize_collisions() {
        assert_eq!(normalize("a b"), normalize("a-b"));
    }
}
