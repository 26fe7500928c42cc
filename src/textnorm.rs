use unicode_normalization::UnicodeNormalization;

/// Cleans one page (or one synthesized window) of extracted text.
///
/// Applied per page so the accumulated text only ever grows by appending
/// already-normalised pages.
pub fn normalize_page(raw: &str) -> String {
    let s = raw.replace("\r\n", "\n").replace('\r', "\n");
    let s: String = s.nfkc().collect();
    let s = sanitize_control_chars(&s);
    s.lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn sanitize_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| {
            // Keep newlines and tabs.
            if ch == '\n' || ch == '\t' {
                return true;
            }
            !ch.is_control()
        })
        .collect()
}

/// Replaces the five predefined XML entities and numeric character references.
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            e if e.starts_with("#x") || e.starts_with("#X") => {
                u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
            }
            e if e.starts_with('#') => e[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_control_chars() {
        let out = normalize_page("Alpha\u{0002}Beta\u{0084}\nLine\tTabbed\r\nNext");
        assert!(!out.contains('\u{0002}'));
        assert!(!out.contains('\u{0084}'));
        assert!(out.contains("AlphaBeta"));
        assert!(out.contains("Line\tTabbed\nNext"));
    }

    #[test]
    fn trims_trailing_whitespace_and_outer_newlines() {
        assert_eq!(normalize_page("\n\nfoo   \nbar\t\n\n"), "foo\nbar");
    }

    #[test]
    fn folds_compatibility_forms() {
        assert_eq!(normalize_page("ﬁle №5"), "file No5");
    }

    #[test]
    fn unescapes_entities() {
        assert_eq!(unescape_xml("a &amp; b &lt;c&gt; &#65;&#x42; &bogus; &"), "a & b <c> AB &bogus; &");
    }
}
