//! Human-readable titles for formula identifiers.
//!
//! Formula names match the identifier of the unit they were written in, so
//! they read like `createPrefabFromSelection` or `m_HTMLExport2D`. Display
//! code and multi-word search both work on the nicified form.

/// Convert an identifier into a space-separated title.
///
/// - a leading `m_`, `_`, or `k` followed by an uppercase letter is dropped
/// - underscores become spaces
/// - a space is inserted at lower→upper, letter→digit, and before a capital
///   that follows a capital or digit and starts a lowercase word
/// - the first letter is capitalized
///
/// ```
/// # use formulas_engine::nicify::nicify;
/// assert_eq!(nicify("createPrefabFromSelection"), "Create Prefab From Selection");
/// assert_eq!(nicify("HTMLExport2D"), "HTML Export 2D");
/// ```
#[must_use]
pub fn nicify(name: &str) -> String {
    let trimmed = strip_prefix(name);
    let chars: Vec<char> = trimmed.chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            push_space(&mut out);
            continue;
        }

        if i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = (c.is_uppercase() && prev.is_lowercase())
                || (c.is_ascii_digit() && prev.is_alphabetic())
                || (c.is_uppercase()
                    && (prev.is_uppercase() || prev.is_ascii_digit())
                    && next.is_some_and(char::is_lowercase));
            if boundary {
                push_space(&mut out);
            }
        }

        if out.is_empty() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }

    out.trim_end().to_string()
}

fn strip_prefix(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix("m_") {
        return rest;
    }
    if let Some(rest) = name.strip_prefix('_') {
        return rest;
    }
    if let Some(rest) = name.strip_prefix('k')
        && rest.starts_with(char::is_uppercase)
    {
        return rest;
    }
    name
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(nicify("alignObjects"), "Align Objects");
        assert_eq!(nicify("AlignObjects"), "Align Objects");
    }

    #[test]
    fn test_acronym_runs() {
        assert_eq!(nicify("HTMLParser"), "HTML Parser");
        assert_eq!(nicify("ExportToFBX"), "Export To FBX");
    }

    #[test]
    fn test_digits() {
        assert_eq!(nicify("snapTo2DGrid"), "Snap To 2D Grid");
        assert_eq!(nicify("layer2Mask"), "Layer 2 Mask");
    }

    #[test]
    fn test_prefixes_and_underscores() {
        assert_eq!(nicify("m_selectionCount"), "Selection Count");
        assert_eq!(nicify("_hiddenThing"), "Hidden Thing");
        assert_eq!(nicify("kMaxSize"), "Max Size");
        assert_eq!(nicify("keepAlive"), "Keep Alive");
        assert_eq!(nicify("rename__all_assets"), "Rename all assets");
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(nicify(""), "");
        assert_eq!(nicify("x"), "X");
    }
}
