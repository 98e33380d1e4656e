use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error context information
///
/// Carries enough to correlate an error with a request without ever holding
/// audio content or credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub operation: String,
    pub user_id: Option<String>,
    pub module: Option<String>,
    pub additional: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn add_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation={}", self.operation)?;
        if let Some(user_id) = &self.user_id {
            write!(f, " user_id={user_id}")?;
        }
        if let Some(module) = &self.module {
            write!(f, " module={module}")?;
        }
        for (key, value) in &self.additional {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}
