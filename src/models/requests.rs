//! Request DTOs for the admin API

use serde::Deserialize;

const MAX_PATTERN_LEN: usize = 1024;
const MAX_BATCH_URLS: usize = 100;

/// Request body for POST /invalidate
///
/// `pattern` is matched against keys as a substring and as a regular
/// expression.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_PATTERN_LEN {
            return Some(format!(
                "Pattern exceeds maximum length of {MAX_PATTERN_LEN} characters"
            ));
        }
        None
    }
}

/// Request body for POST /batch
#[derive(Debug, Clone, Deserialize)]
pub struct BatchFetchRequest {
    /// Upstream paths, fetched with GET
    pub urls: Vec<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl BatchFetchRequest {
    pub fn validate(&self) -> Option<String> {
        if self.urls.is_empty() {
            return Some("At least one URL is required".to_string());
        }
        if self.urls.len() > MAX_BATCH_URLS {
            return Some(format!("A batch holds at most {MAX_BATCH_URLS} URLs"));
        }
        if self.urls.iter().any(|url| !url.starts_with('/')) {
            return Some("URLs must be upstream paths starting with '/'".to_string());
        }
        None
    }
}
