//! File name derivation from a URL.

/// Used when the URL path yields nothing usable.
const FALLBACK_NAME: &str = "download.bin";

/// Longest file name Linux accepts, in bytes.
const NAME_MAX: usize = 255;

/// Last non-empty path segment of `url`, percent-decoded and made safe for a
/// local file name.
///
/// - `https://example.com/pkg/tool.tar.gz?sig=1` → `tool.tar.gz`
/// - `https://example.com/my%20file.bin` → `my_file.bin`
/// - `https://example.com/` → `download.bin`
pub fn derive_file_name(url: &str) -> String {
    let segment = url::Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
            .map(|s| {
                let raw = urlencoding::decode_binary(s.as_bytes());
                String::from_utf8_lossy(&raw).into_owned()
            })
    });
    let Some(segment) = segment else {
        return FALLBACK_NAME.to_string();
    };
    let cleaned = sanitize(&segment);
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Replace separators, NUL and control characters (plus whitespace) with a single `_`,
/// trim dots and underscores at both ends, cap at `NAME_MAX` bytes.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let bad = c == '/' || c == '\\' || c == '\0' || c.is_control() || c.is_whitespace();
        if bad {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment_wins() {
        assert_eq!(
            derive_file_name("https://cdn.example.com/a/b/debian-12.iso"),
            "debian-12.iso"
        );
        assert_eq!(
            derive_file_name("https://example.com/file.zip?token=abc#frag"),
            "file.zip"
        );
        assert_eq!(derive_file_name("https://example.com/dir/"), "dir");
    }

    #[test]
    fn escapes_are_decoded_before_sanitizing() {
        assert_eq!(derive_file_name("https://example.com/my%20file.bin"), "my_file.bin");
        assert_eq!(
            derive_file_name("https://example.com/caf%C3%A9.txt"),
            "café.txt"
        );
        // an encoded separator never escapes the target directory
        assert_eq!(derive_file_name("https://example.com/a%2Fb.bin"), "a_b.bin");
        assert_eq!(derive_file_name("https://example.com/%2E%2E"), FALLBACK_NAME);
    }

    #[test]
    fn fallback_for_empty_or_unparseable() {
        assert_eq!(derive_file_name("https://example.com/"), FALLBACK_NAME);
        assert_eq!(derive_file_name("https://example.com"), FALLBACK_NAME);
        assert_eq!(derive_file_name("not a url"), FALLBACK_NAME);
        assert_eq!(derive_file_name("https://example.com/.."), FALLBACK_NAME);
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("a\tb\n\nc"), "a_b_c");
        assert_eq!(sanitize("..hidden.."), "hidden");
        let long = "é".repeat(200);
        let s = sanitize(&long);
        assert!(s.len() <= NAME_MAX);
        assert!(s.chars().all(|c| c == 'é'));
    }
}
