// Sanitization utilities
// Removes credentials and payload blobs from text before it leaves the process

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BEARER_REGEX: Regex =
        Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").unwrap();
    static ref KEY_VALUE_REGEX: Regex = Regex::new(
        r#"(?i)\b(subscription[_-]?key|api[_-]?key|secret|password|token|ocp-apim-subscription-key)(["']?\s*[:=]\s*["']?)[^\s"',&]+"#
    )
    .unwrap();
    // Long base64 runs are almost always encoded audio or key material
    static ref BLOB_REGEX: Regex =
        Regex::new(r"[A-Za-z0-9+/]{120,}={0,2}").unwrap();
}

pub const MAX_MESSAGE_LEN: usize = 512;

pub struct DataSanitizer {
    max_len: usize,
}

impl Default for DataSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSanitizer {
    pub fn new() -> Self {
        Self { max_len: MAX_MESSAGE_LEN }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Strip bearer tokens, `key=value` credentials and encoded blobs, then
    /// truncate on a char boundary.
    pub fn sanitize_for_logging(&self, data: &str) -> String {
        let text = BEARER_REGEX.replace_all(data, "Bearer [REDACTED]");
        let text = KEY_VALUE_REGEX.replace_all(&text, "${1}${2}[REDACTED]");
        let text = BLOB_REGEX.replace_all(&text, "[BLOB]");

        if text.chars().count() <= self.max_len {
            return text.into_owned();
        }
        let mut truncated: String = text.chars().take(self.max_len).collect();
        truncated.push_str("...");
        truncated
    }
}
