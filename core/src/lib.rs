//! Core utilities and shared types for the jsgrab pipeline.

pub mod slots;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Substring a line must contain to be considered a script URL. Case-sensitive.
pub const SCRIPT_MARKER: &str = ".js";

/// Cheap relevance filter for candidate lines. Expects an already trimmed line.
pub fn is_script_candidate(line: &str) -> bool {
    !line.is_empty() && line.contains(SCRIPT_MARKER)
}

/// Everything before the first `?`. Used both as the dedup identity and as the
/// base for destination file names.
pub fn strip_query(url: &str) -> &str {
    match url.split_once('?') {
        Some((base, _)) => base,
        None => url,
    }
}

/// Dedup identity of a script URL: the record with its query string removed.
/// No case or percent-encoding normalization happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey(pub String);

impl From<&str> for CanonicalKey {
    fn from(s: &str) -> Self {
        CanonicalKey(strip_query(s).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn query_is_dropped_from_key() {
        let a = CanonicalKey::from("http://x/a.js?foo=1");
        let b = CanonicalKey::from("http://x/a.js?bar=2");
        assert_eq!(a, b);
        assert_eq!(a.0, "http://x/a.js");
        assert_ne!(CanonicalKey::from("http://x/a.js"), CanonicalKey::from("http://x/b.js"));
    }

    #[test]
    fn only_first_question_mark_splits() {
        assert_eq!(strip_query("http://x/a.js?v=1?w=2"), "http://x/a.js");
        assert_eq!(strip_query("?v=1"), "");
    }

    #[test]
    fn host_case_is_significant() {
        assert_ne!(CanonicalKey::from("http://X/a.js"), CanonicalKey::from("http://x/a.js"));
    }

    #[test]
    fn candidate_filter() {
        assert!(is_script_candidate("http://x/app.js"));
        assert!(is_script_candidate("http://x/app.json"));
        assert!(!is_script_candidate("http://x/style.css"));
        assert!(!is_script_candidate("http://x/APP.JS"));
        assert!(!is_script_candidate(""));
    }
}
