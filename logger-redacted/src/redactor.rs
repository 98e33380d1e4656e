use base64::{engine::general_purpose, Engine as _};
use error_common::DataSanitizer;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+1[-.\s]?)?\(?\b[0-9]{3}\)?[-.\s][0-9]{3}[-.\s][0-9]{4}\b").unwrap();
    static ref IP_REGEX: Regex = Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap();
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ip_addresses: bool,
    pub redact_credentials: bool,
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ip_addresses: true,
            redact_credentials: true,
            hash_for_correlation: true,
        }
    }
}

/// PII redactor for log lines and client-facing messages
pub struct PiiRedactor {
    config: RedactionConfig,
    sanitizer: DataSanitizer,
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(RedactionConfig::default())
    }
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        // Log lines can be long (JSON events); only client messages get truncated
        Self {
            config,
            sanitizer: DataSanitizer::with_max_len(usize::MAX),
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = if self.config.redact_credentials {
            self.sanitizer.sanitize_for_logging(text)
        } else {
            text.to_string()
        };

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL", |email| {
                match email.split_once('@') {
                    Some((local, domain)) => format!("{}***@{}***", first_char(local), first_char(domain)),
                    None => "***@***".to_string(),
                }
            });
        }

        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE", |_| "(***) ***-****".to_string());
        }

        if self.config.redact_ip_addresses {
            result = self.replace(&IP_REGEX, &result, "IP", |ip| {
                let parts: Vec<&str> = ip.split('.').collect();
                match (parts.first(), parts.last()) {
                    (Some(first), Some(last)) if parts.len() == 4 => format!("{first}.***.***.{last}"),
                    _ => "***.***.***.***".to_string(),
                }
            });
        }

        result
    }

    fn replace(&self, regex: &Regex, text: &str, label: &str, mask: impl Fn(&str) -> String) -> String {
        regex
            .replace_all(text, |caps: &regex::Captures| {
                let found = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                if self.config.hash_for_correlation {
                    format!("{label}[{}]", hash_value(found))
                } else {
                    mask(found)
                }
            })
            .into_owned()
    }
}

fn first_char(s: &str) -> String {
    s.chars().next().map(String::from).unwrap_or_default()
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    // First 8 bytes are plenty for correlating lines within one deployment
    general_purpose::STANDARD_NO_PAD.encode(&digest[..8])
}
