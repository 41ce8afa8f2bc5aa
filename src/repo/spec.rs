//! User-supplied spec strings

use percent_encoding::percent_decode_str;

/// A spec as received from a client
///
/// `raw` is the exact text the client sent and keys the resolution cache,
/// because `owner%2Frepo` and `owner/repo` may resolve differently.
/// `question` is what the resolver is asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    raw: String,
    question: String,
}

impl Spec {
    /// A spec taken verbatim from a URL path segment (still percent-encoded)
    pub fn from_path_segment(raw: &str) -> Self {
        let question = percent_decode_str(raw).decode_utf8_lossy().into_owned();
        Self {
            raw: raw.to_string(),
            question,
        }
    }

    /// A spec that was already decoded (query parameter, CLI argument)
    pub fn from_query(question: &str) -> Self {
        Self {
            raw: question.to_string(),
            question: question.to_string(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}
